//! `configure` end to end: templates, symlinks, gitignore and reconciliation.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use super::common::{TestProject, record_generated};

const WATCH1: &str = "core:\n  project:\n    name: watch1\n";

#[test]
fn basic_template() {
  let project = TestProject::new(WATCH1);
  project.write("test.txt.jinja", "This is {{core.project.name}} project.");

  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();

  assert!(!kernel.has_failures(), "{:?}", kernel.failures());
  assert_eq!(project.read("test.txt"), "This is watch1 project.");
  assert_eq!(project.ignored(), ["/test.txt"]);
}

#[cfg(unix)]
#[test]
fn chain_rendering() {
  let project = TestProject::new("core:\n  env:\n    current: dev\n");
  project.write("test.dev.yml.jinja", "{\"env\": \"{{ core.env.current }}\"}");

  let kernel = project.kernel();
  let generated = record_generated(&kernel, project.path());
  kernel.execute_command("configure").unwrap();

  assert!(!kernel.has_failures(), "{:?}", kernel.failures());
  assert_eq!(project.read("test.dev.yml"), "{\"env\": \"dev\"}");
  assert_eq!(
    fs::read_link(project.join("test.yml")).unwrap(),
    PathBuf::from("test.dev.yml")
  );
  assert_eq!(project.read("test.yml"), "{\"env\": \"dev\"}");
  assert_eq!(*generated.borrow(), ["test.dev.yml", "test.yml"]);
  assert_eq!(project.ignored(), ["/test.dev.yml", "/test.yml"]);
}

#[test]
fn unchanged_template_is_not_rewritten() {
  let project = TestProject::new(WATCH1);
  project.write("test.txt.jinja", "This is {{core.project.name}} project.");

  let kernel = project.kernel();
  let generated = record_generated(&kernel, project.path());
  kernel.execute_command("configure").unwrap();
  assert_eq!(*generated.borrow(), ["test.txt"]);

  generated.borrow_mut().clear();
  kernel.execute_command("configure").unwrap();
  assert!(generated.borrow().is_empty(), "{:?}", generated.borrow());
  assert_eq!(project.read("test.txt"), "This is watch1 project.");
}

#[test]
fn eject_announces_unchanged_files() {
  let project = TestProject::new(WATCH1);
  project.write("test.txt.jinja", "static");
  project.write("test.txt", "static");

  let kernel = project.kernel_with(ddb_lib::kernel::KernelOptions {
    eject: true,
    ..Default::default()
  });
  let generated = record_generated(&kernel, project.path());
  kernel.execute_command("configure").unwrap();
  assert_eq!(*generated.borrow(), ["test.txt"]);
}

#[test]
fn deleting_a_template_removes_its_target() {
  let project = TestProject::new(WATCH1);
  project.write("test.txt.jinja", "This is {{core.project.name}} project.");
  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();
  assert!(project.exists("test.txt"));

  project.remove("test.txt.jinja");
  kernel.execute_command("configure").unwrap();

  assert!(!project.exists("test.txt"));
  assert!(project.ignored().is_empty());
  assert_eq!(project.read(".gitignore"), "");
}

#[test]
fn hand_edited_targets_are_preserved() {
  let project = TestProject::new(WATCH1);
  project.write("test.txt.jinja", "This is {{core.project.name}} project.");
  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();

  project.write("test.txt", "edited by hand");
  project.remove("test.txt.jinja");
  kernel.execute_command("configure").unwrap();

  assert_eq!(project.read("test.txt"), "edited by hand");
}

#[test]
fn reconciliation_survives_a_restart() {
  let project = TestProject::new(WATCH1);
  let caches = TempDir::new().unwrap();
  project.write("test.txt.jinja", "This is {{core.project.name}} project.");

  let first = project.persistent_kernel(caches.path());
  first.execute_command("configure").unwrap();
  first.shutdown().unwrap();
  drop(first);
  assert!(project.exists("test.txt"));

  project.remove("test.txt.jinja");
  let second = project.persistent_kernel(caches.path());
  second.execute_command("configure").unwrap();
  second.shutdown().unwrap();

  assert!(!project.exists("test.txt"));
  assert!(project.ignored().is_empty());
}

#[test]
fn configuration_files_are_never_overwritten() {
  let project = TestProject::new(WATCH1);
  project.write("ddb.yml.jinja", "core: {}\n");

  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();

  assert_eq!(project.read("ddb.yml"), WATCH1);
  assert!(project.ignored().is_empty());
}

#[test]
fn render_errors_are_recorded_and_the_run_continues() {
  let project = TestProject::new(WATCH1);
  project.write("a.txt.jinja", "{{ missing.key }}");
  project.write("b.txt.jinja", "{{ core.project.name }}");

  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();

  let failures = kernel.failures();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0].action, "jinja.render");
  assert!(failures[0].message.contains("'missing.key' is undefined"));
  assert!(!project.exists("a.txt"));
  assert_eq!(project.read("b.txt"), "watch1");
}

#[test]
fn fail_fast_stops_the_command() {
  let project = TestProject::new(WATCH1);
  project.write("a.txt.jinja", "{{ missing.key }}");
  project.write("b.txt.jinja", "{{ core.project.name }}");

  let kernel = project.kernel_with(ddb_lib::kernel::KernelOptions {
    fail_fast: true,
    ..Default::default()
  });
  assert!(kernel.execute_command("configure").is_err());
  assert!(!project.exists("b.txt"));
}

#[test]
fn gitignore_block_is_sorted() {
  let project = TestProject::new(WATCH1);
  for name in ["zeta", "alpha", "mid/beta"] {
    project.write(&format!("{}.txt.jinja", name), "x");
  }

  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();

  assert_eq!(project.ignored(), ["/alpha.txt", "/mid/beta.txt", "/zeta.txt"]);
}
