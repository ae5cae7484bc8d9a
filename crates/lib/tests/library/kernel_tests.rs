//! Kernel behavior across features: ordering, configuration and commands.

use std::cell::RefCell;
use std::rc::Rc;

use ddb_lib::action::{Action, EventBinding};
use ddb_lib::config::{self, ConfigRoots, migrations};
use ddb_lib::event::topics;
use ddb_lib::feature::{Feature, FeatureError};
use ddb_lib::features::builtin_features;
use ddb_lib::kernel::{Kernel, KernelError, KernelOptions};

use super::common::{TestProject, with_output};

type Log = Rc<RefCell<Vec<String>>>;

struct Append {
  name: String,
  order: i32,
  log: Log,
}

impl Action for Append {
  fn name(&self) -> &str {
    &self.name
  }

  fn bindings(self: Rc<Self>) -> Vec<EventBinding> {
    let this = self.clone();
    vec![EventBinding::new(&topics::phase("configure")).call(move |_, _| {
      this.log.borrow_mut().push(this.name.clone());
      Ok(())
    })]
  }

  fn order(&self) -> i32 {
    self.order
  }
}

fn append(name: &str, order: i32, log: &Log) -> Rc<dyn Action> {
  Rc::new(Append {
    name: name.to_string(),
    order,
    log: log.clone(),
  })
}

#[test]
fn actions_run_in_ascending_order() {
  let project = TestProject::new("");
  let kernel = project.kernel();
  let log: Log = Rc::default();
  kernel.register_action(append("A", 2, &log)).unwrap();
  kernel.register_action(append("B", 1, &log)).unwrap();
  kernel.execute_command("configure").unwrap();
  assert_eq!(*log.borrow(), ["B", "A"]);

  let log: Log = Rc::default();
  let kernel = project.kernel();
  for (name, order) in [("three", 3), ("one", 1), ("two", 2)] {
    kernel.register_action(append(name, order, &log)).unwrap();
  }
  kernel.execute_command("configure").unwrap();
  assert_eq!(*log.borrow(), ["one", "two", "three"]);
}

struct Needs(&'static str, &'static str);

impl Feature for Needs {
  fn name(&self) -> &str {
    self.0
  }

  fn dependencies(&self) -> Vec<String> {
    vec![self.1.to_string()]
  }
}

#[test]
fn missing_dependency_fails_before_registration() {
  let project = TestProject::new("");
  let kernel = Kernel::new(project.config(), KernelOptions::default()).unwrap();
  let mut features = builtin_features();
  features.push(Rc::new(Needs("docker", "compose")));

  let err = kernel.load_features(features).unwrap_err();
  assert!(matches!(
    err,
    KernelError::Feature(FeatureError::MissingDependency { ref feature, ref dependency })
      if feature == "docker" && dependency == "compose"
  ));
  assert!(kernel.features().is_empty());
  assert!(kernel.commands().is_empty());
}

#[test]
fn features_load_in_dependency_order() {
  let project = TestProject::new("");
  let kernel = project.kernel();
  let names = kernel.features().names();
  let position = |name: &str| names.iter().position(|n| n == name).unwrap();

  assert_eq!(names.len(), builtin_features().len());
  for feature in kernel.features().all() {
    for dependency in feature.dependencies() {
      let dependency = dependency.trim_end_matches(ddb_lib::feature::OPTIONAL);
      assert!(position(dependency) < position(feature.name()), "{} before {}", dependency, feature.name());
    }
  }
}

#[test]
fn disabled_features_contribute_nothing() {
  let project = TestProject::new("jinja:\n  disabled: true\n");
  project.write("test.txt.jinja", "x");
  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();

  assert!(kernel.features().has("jinja"));
  assert!(!kernel.actions().has("jinja.render"));
  assert!(!project.exists("test.txt"));
}

#[test]
fn migrated_keys_resolve_both_ways() {
  let project = TestProject::new("docker:\n  build_image_tag: v1\n");
  let config = project.config();

  assert_eq!(config.get_str("jsonnet.docker.build.image_tag").as_deref(), Some("v1"));
  assert_eq!(config.deprecations().len(), 1);

  assert_eq!(config.get_str("docker.build_image_tag").as_deref(), Some("v1"));
  let after_first_read = config.deprecations().len();
  assert_eq!(config.get_str("docker.build_image_tag").as_deref(), Some("v1"));
  assert_eq!(config.deprecations().len(), after_first_read);
}

#[test]
fn environment_overrides_win_over_files() {
  let project = TestProject::new("app:\n  db:\n    host: localhost\n");
  let lookup = |name: &str| (name == "DDB_APP_DB_HOST").then(|| "db.internal".to_string());
  let config = config::load_with(&ConfigRoots::single(project.path()), &lookup, migrations::builtin()).unwrap();
  assert_eq!(config.get_str("app.db.host").as_deref(), Some("db.internal"));
}

#[test]
fn features_command_lists_every_feature() {
  let project = TestProject::new("");
  let (kernel, output) = with_output(project.kernel());
  kernel.execute_command("features").unwrap();

  let listing = output.contents();
  assert_eq!(listing.lines().count(), builtin_features().len());
  assert!(listing.contains("core (enabled)\n"), "{listing}");
  assert!(listing.contains("jinja (enabled), requires core, file\n"), "{listing}");
}

#[test]
fn run_prints_configured_binaries() {
  let project = TestProject::new("run:\n  binaries:\n    psql:\n      command: [docker, compose, exec, db, psql]\n");
  let (kernel, output) = with_output(project.kernel());
  kernel.set_arguments(
    [
      ("name".to_string(), vec!["psql".to_string()]),
      ("args".to_string(), vec!["-U".to_string(), "app".to_string()]),
    ]
    .into_iter()
    .collect(),
  );
  kernel.execute_command("run").unwrap();

  assert_eq!(output.contents(), "docker compose exec db psql -U app\n");
  assert!(project.exists(".bin/psql"));
  assert_eq!(project.ignored(), ["/.bin/psql"]);
}

#[test]
fn unknown_command_is_an_error() {
  let project = TestProject::new("");
  let kernel = project.kernel();
  assert!(matches!(
    kernel.execute_command("deploy"),
    Err(KernelError::UnknownCommand(name)) if name == "deploy"
  ));
}
