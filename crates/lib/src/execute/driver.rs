//! The build driver.
//!
//! Building a configuration runs strictly in sequence:
//! 1. every configuration it depends on is built compile-only (no link),
//!    dependencies first;
//! 2. each stale non-entry source is compiled;
//! 3. if the configuration has an entry point, the entry is compiled when
//!    stale, the object set is planned and the artifact is relinked when any
//!    object is at least as new as it.
//!
//! A rerun with nothing changed on disk issues no toolchain invocations.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::plan::{library_sources, plan_objects};
use super::toolchain::Toolchain;
use super::types::{BuildError, BuildOptions, BuildReport, CompileStep};
use crate::config::{BuildConfiguration, ConfigRegistry};
use crate::deps::{FreshnessOracle, MtimeOracle, include_closure, needs_rebuild};

pub struct Builder<'a, T, O = MtimeOracle> {
  registry: &'a ConfigRegistry,
  toolchain: T,
  oracle: O,
  options: BuildOptions,
}

impl<'a, T: Toolchain> Builder<'a, T> {
  pub fn new(registry: &'a ConfigRegistry, toolchain: T) -> Self {
    Self {
      registry,
      toolchain,
      oracle: MtimeOracle,
      options: BuildOptions::default(),
    }
  }
}

impl<'a, T: Toolchain, O: FreshnessOracle> Builder<'a, T, O> {
  /// Use a different freshness oracle.
  pub fn with_oracle<P: FreshnessOracle>(self, oracle: P) -> Builder<'a, T, P> {
    Builder {
      registry: self.registry,
      toolchain: self.toolchain,
      oracle,
      options: self.options,
    }
  }

  pub fn with_options(mut self, options: BuildOptions) -> Self {
    self.options = options;
    self
  }

  pub fn toolchain(&self) -> &T {
    &self.toolchain
  }

  /// Build configuration `name`, including its dependencies.
  ///
  /// The first failure aborts the build. Objects compiled before it remain on
  /// disk.
  pub async fn build(&self, name: &str) -> Result<BuildReport, BuildError> {
    let order = self.registry.build_order(name)?;
    let mut report = BuildReport::new(name, self.options.dry_run);

    for dep in order.iter().filter(|dep| **dep != name) {
      self.build_step(self.registry.get(dep)?, true, &mut report).await?;
    }
    self.build_step(self.registry.get(name)?, false, &mut report).await?;

    Ok(report)
  }

  async fn build_step(
    &self,
    config: &BuildConfiguration,
    as_dependency: bool,
    report: &mut BuildReport,
  ) -> Result<(), BuildError> {
    let entry = if as_dependency { None } else { config.entry.as_ref() };
    info!(configuration = %config.name, as_dependency, "building");

    for source in library_sources(config)? {
      self.compile_if_stale(config, source, report).await?;
    }

    if let Some(entry) = entry {
      self.compile_if_stale(config, entry, report).await?;

      let objects: Vec<PathBuf> = plan_objects(self.registry, &config.name, true)?.into_iter().collect();
      let artifact = config.artifact_path();
      self.link_if_stale(config, &objects, &artifact, report).await?;
      report.artifact = Some(artifact);
    }

    info!(configuration = %config.name, "finished");
    Ok(())
  }

  async fn compile_if_stale(
    &self,
    config: &BuildConfiguration,
    source: &Path,
    report: &mut BuildReport,
  ) -> Result<(), BuildError> {
    let object = config.object_path(source);

    if !needs_rebuild(&self.oracle, source, Some(&object), &config.include_dirs)? {
      debug!(source = %source.display(), "up to date");
      return Ok(());
    }

    // Every quoted include must resolve before the compiler sees the file.
    include_closure(source, &config.include_dirs)?;

    info!(source = %source.display(), object = %object.display(), "compiling");
    if !self.options.dry_run {
      self
        .toolchain
        .compile(source, &object, &config.compile_flags, &config.include_dirs)
        .await?;
    }

    report.compiled.push(CompileStep {
      configuration: config.name.clone(),
      source: source.to_path_buf(),
      object,
    });
    Ok(())
  }

  async fn link_if_stale(
    &self,
    config: &BuildConfiguration,
    objects: &[PathBuf],
    artifact: &Path,
    report: &mut BuildReport,
  ) -> Result<(), BuildError> {
    if !self.link_needed(objects, artifact, report)? {
      debug!(artifact = %artifact.display(), "artifact up to date");
      return Ok(());
    }

    info!(artifact = %artifact.display(), objects = objects.len(), "linking");
    if !self.options.dry_run {
      self.toolchain.link(objects, &config.link_flags, artifact).await?;
    }

    report.linked = Some(artifact.to_path_buf());
    Ok(())
  }

  fn link_needed(&self, objects: &[PathBuf], artifact: &Path, report: &BuildReport) -> Result<bool, BuildError> {
    if objects.iter().any(|object| report.compiled_object(object)) {
      return Ok(true);
    }

    let Some(reference) = self.oracle.stamp(artifact).map_err(BuildError::io(artifact))? else {
      return Ok(true);
    };

    for object in objects {
      if self.oracle.is_stale(object, &reference).map_err(BuildError::io(object))? {
        return Ok(true);
      }
    }
    Ok(false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::execute::toolchain::ToolchainError;
  use std::cell::{Cell, RefCell};
  use std::fs::{self, File};
  use std::rc::Rc;
  use std::time::{Duration, SystemTime};
  use tempfile::TempDir;

  #[derive(Debug, Clone, PartialEq, Eq)]
  enum Invocation {
    Compile(PathBuf),
    Link(PathBuf, Vec<PathBuf>),
  }

  /// Hands out strictly increasing timestamps so writes are always ordered.
  #[derive(Clone)]
  struct Clock(Rc<Cell<u64>>);

  impl Clock {
    fn new() -> Self {
      Self(Rc::new(Cell::new(1_000)))
    }

    fn tick(&self) -> SystemTime {
      self.0.set(self.0.get() + 1);
      SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + self.0.get())
    }
  }

  /// Writes its outputs stamped by the shared clock and records each call.
  struct FakeToolchain {
    clock: Clock,
    log: RefCell<Vec<Invocation>>,
    fail_on: Option<PathBuf>,
  }

  impl FakeToolchain {
    fn new(clock: &Clock) -> Self {
      Self {
        clock: clock.clone(),
        log: RefCell::new(Vec::new()),
        fail_on: None,
      }
    }

    fn failing_on(mut self, source: &Path) -> Self {
      self.fail_on = Some(source.to_path_buf());
      self
    }

    fn take(&self) -> Vec<Invocation> {
      self.log.take()
    }

    fn emit(&self, path: &Path) {
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, "").unwrap();
      set_mtime(path, self.clock.tick());
    }
  }

  impl Toolchain for FakeToolchain {
    async fn compile(
      &self,
      source: &Path,
      object: &Path,
      _flags: &[String],
      _include_dirs: &[PathBuf],
    ) -> Result<(), ToolchainError> {
      self.log.borrow_mut().push(Invocation::Compile(source.to_path_buf()));
      if self.fail_on.as_deref() == Some(source) {
        return Err(ToolchainError::Failed {
          program: "fake-cc".to_string(),
          code: Some(3),
        });
      }
      self.emit(object);
      Ok(())
    }

    async fn link(&self, objects: &[PathBuf], _flags: &[String], output: &Path) -> Result<(), ToolchainError> {
      self
        .log
        .borrow_mut()
        .push(Invocation::Link(output.to_path_buf(), objects.to_vec()));
      self.emit(output);
      Ok(())
    }
  }

  fn set_mtime(path: &Path, time: SystemTime) {
    File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
  }

  /// A source tree whose files all predate anything the toolchain writes.
  struct Project {
    temp: TempDir,
    clock: Clock,
  }

  impl Project {
    fn new() -> Self {
      Self {
        temp: TempDir::new().unwrap(),
        clock: Clock::new(),
      }
    }

    fn root(&self) -> PathBuf {
      dunce::canonicalize(self.temp.path()).unwrap()
    }

    fn out(&self) -> PathBuf {
      self.root().join("bin")
    }

    fn file(&self, rel: &str, content: &str) -> PathBuf {
      let path = self.root().join(rel);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(&path, content).unwrap();
      set_mtime(&path, SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000));
      path
    }

    fn touch(&self, path: &Path) {
      set_mtime(path, self.clock.tick());
    }
  }

  const MAIN: &str = "#include \"common.h\"\nint main(void) { return 0; }\n";

  /// `modules` (no entry; a.c, b.c) and `release` (entry main.c; depends on modules).
  fn scenario(project: &Project) -> (ConfigRegistry, PathBuf, PathBuf, PathBuf) {
    project.file("src/common.h", "");
    let a = project.file("modules/a.c", "#include \"common.h\"\n");
    let b = project.file("modules/b.c", "");
    let main = project.file("src/main.c", MAIN);
    let src = project.root().join("src");

    let registry = ConfigRegistry::new([
      BuildConfiguration::new("modules", project.out())
        .with_sources([&a, &b])
        .with_include_dirs([&src]),
      BuildConfiguration::new("release", project.out())
        .with_entry(&main)
        .with_sources([&main])
        .with_include_dirs([&src])
        .depends_on(["modules"]),
    ])
    .unwrap();

    (registry, a, b, main)
  }

  #[tokio::test]
  async fn first_build_compiles_everything_and_links() {
    let project = Project::new();
    let (registry, a, b, main) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    let report = builder.build("release").await.unwrap();

    let release = registry.get("release").unwrap();
    let modules = registry.get("modules").unwrap();
    let mut expected_objects = vec![modules.object_path(&a), modules.object_path(&b), release.object_path(&main)];
    expected_objects.sort();

    assert_eq!(
      builder.toolchain().take(),
      vec![
        Invocation::Compile(a.clone()),
        Invocation::Compile(b.clone()),
        Invocation::Compile(main.clone()),
        Invocation::Link(release.artifact_path(), expected_objects),
      ]
    );
    assert_eq!(report.compiled.len(), 3);
    assert_eq!(report.linked, Some(release.artifact_path()));
    assert_eq!(report.artifact, Some(release.artifact_path()));
  }

  #[tokio::test]
  async fn rebuild_without_changes_is_a_no_op() {
    let project = Project::new();
    let (registry, ..) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    builder.build("release").await.unwrap();
    builder.toolchain().take();

    let report = builder.build("release").await.unwrap();
    assert!(report.is_up_to_date());
    assert!(builder.toolchain().take().is_empty());
  }

  #[tokio::test]
  async fn object_as_new_as_artifact_forces_relink_only() {
    let project = Project::new();
    let (registry, a, ..) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    builder.build("release").await.unwrap();
    builder.toolchain().take();

    let release = registry.get("release").unwrap();
    let artifact = release.artifact_path();
    let object = registry.get("modules").unwrap().object_path(&a);
    set_mtime(&object, fs::metadata(&artifact).unwrap().modified().unwrap());

    let report = builder.build("release").await.unwrap();

    let log = builder.toolchain().take();
    assert_eq!(log.len(), 1);
    assert!(matches!(&log[0], Invocation::Link(output, _) if *output == artifact));
    assert!(report.compiled.is_empty());
    assert_eq!(report.linked, Some(artifact));
  }

  #[tokio::test]
  async fn dependency_built_separately_triggers_relink() {
    let project = Project::new();
    let (registry, _, b, _) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    builder.build("release").await.unwrap();
    project.touch(&b);
    builder.build("modules").await.unwrap();
    builder.toolchain().take();

    let report = builder.build("release").await.unwrap();

    let log = builder.toolchain().take();
    assert_eq!(log.len(), 1);
    assert!(matches!(log[0], Invocation::Link(..)));
    assert!(report.compiled.is_empty());
  }

  #[tokio::test]
  async fn non_utf8_source_builds() {
    let project = Project::new();
    let source = project.root().join("lib/a.c");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, b"/* caf\xE9 */\nint helper(void) { return 0; }\n").unwrap();
    let registry = ConfigRegistry::new([BuildConfiguration::new("lib", project.out()).with_sources([&source])]).unwrap();
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    let report = builder.build("lib").await.unwrap();

    assert_eq!(builder.toolchain().take(), vec![Invocation::Compile(source)]);
    assert_eq!(report.compiled.len(), 1);
  }

  #[tokio::test]
  async fn touching_entry_recompiles_only_entry_and_relinks() {
    let project = Project::new();
    let (registry, _, _, main) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    builder.build("release").await.unwrap();
    builder.toolchain().take();

    project.touch(&main);
    builder.build("release").await.unwrap();

    let log = builder.toolchain().take();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], Invocation::Compile(main));
    assert!(matches!(log[1], Invocation::Link(..)));
  }

  #[tokio::test]
  async fn header_change_rebuilds_every_includer() {
    let project = Project::new();
    let (registry, a, _, main) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    builder.build("release").await.unwrap();
    builder.toolchain().take();

    project.touch(&project.root().join("src/common.h"));
    builder.build("release").await.unwrap();

    let compiled: Vec<_> = builder
      .toolchain()
      .take()
      .into_iter()
      .filter_map(|i| match i {
        Invocation::Compile(p) => Some(p),
        Invocation::Link(..) => None,
      })
      .collect();
    assert_eq!(compiled, vec![a, main]);
  }

  #[tokio::test]
  async fn compile_only_configuration_has_no_artifact() {
    let project = Project::new();
    let (registry, ..) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    let report = builder.build("modules").await.unwrap();

    assert_eq!(report.compiled.len(), 2);
    assert!(report.linked.is_none());
    assert!(report.artifact.is_none());
    assert!(
      builder
        .toolchain()
        .take()
        .iter()
        .all(|i| matches!(i, Invocation::Compile(_)))
    );
  }

  #[tokio::test]
  async fn dependency_entry_is_neither_compiled_nor_linked() {
    let project = Project::new();
    let app_main = project.file("src/app.c", "int main(void) { return 0; }\n");
    let parse = project.file("src/parse.c", "");
    let test_main = project.file("tests/test.c", "int main(void) { return 0; }\n");

    let registry = ConfigRegistry::new([
      BuildConfiguration::new("debug", project.out())
        .with_entry(&app_main)
        .with_sources([&app_main, &parse]),
      BuildConfiguration::new("test", project.out())
        .with_entry(&test_main)
        .with_sources([&test_main])
        .depends_on(["debug"]),
    ])
    .unwrap();
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    let report = builder.build("test").await.unwrap();

    let debug = registry.get("debug").unwrap();
    let log = builder.toolchain().take();
    assert!(!log.contains(&Invocation::Compile(app_main.clone())));
    let Some(Invocation::Link(output, objects)) = log.last() else {
      panic!("expected a link, got {log:?}");
    };
    assert_eq!(*output, registry.get("test").unwrap().artifact_path());
    assert!(!objects.contains(&debug.object_path(&app_main)));
    assert!(objects.contains(&debug.object_path(&parse)));
    assert!(!debug.artifact_path().exists());
    assert_eq!(report.compiled.len(), 2);
  }

  #[tokio::test]
  async fn missing_include_aborts_before_compiling_that_file() {
    let project = Project::new();
    let good = project.file("src/good.c", "");
    let bad = project.file("src/bad.c", "#include \"nowhere.h\"\n");

    let registry = ConfigRegistry::new([BuildConfiguration::new("lib", project.out()).with_sources([&good, &bad])]).unwrap();
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    let err = builder.build("lib").await.unwrap_err();

    assert!(matches!(err, BuildError::Resolution(_)));
    assert_eq!(builder.toolchain().take(), vec![Invocation::Compile(good)]);
  }

  #[tokio::test]
  async fn toolchain_failure_stops_the_run() {
    let project = Project::new();
    let a = project.file("src/a.c", "");
    let b = project.file("src/b.c", "");
    let c = project.file("src/c.c", "");

    let registry = ConfigRegistry::new([BuildConfiguration::new("lib", project.out()).with_sources([&a, &b, &c])]).unwrap();
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock).failing_on(&b));

    let err = builder.build("lib").await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(
      builder.toolchain().take(),
      vec![Invocation::Compile(a.clone()), Invocation::Compile(b)]
    );

    // The object written before the failure is reused by the next run.
    let rebuilt = Builder::new(&registry, FakeToolchain::new(&project.clock));
    rebuilt.build("lib").await.unwrap();
    assert!(!rebuilt.toolchain().take().contains(&Invocation::Compile(a)));
  }

  #[tokio::test]
  async fn dry_run_reports_without_invoking_toolchain() {
    let project = Project::new();
    let (registry, ..) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock)).with_options(BuildOptions { dry_run: true });

    let report = builder.build("release").await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.compiled.len(), 3);
    assert_eq!(report.linked, Some(registry.get("release").unwrap().artifact_path()));
    assert!(builder.toolchain().take().is_empty());
    assert!(!project.out().exists());
  }

  #[tokio::test]
  async fn unknown_target_is_a_configuration_error() {
    let project = Project::new();
    let (registry, ..) = scenario(&project);
    let builder = Builder::new(&registry, FakeToolchain::new(&project.clock));

    let err = builder.build("nightly").await.unwrap_err();
    assert!(matches!(err, BuildError::Configuration(_)));
  }
}
