//! Watch mode: file changes on disk drive the same pipeline as `configure`.

use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use ddb_lib::kernel::Kernel;
use ddb_lib::watch::WatchLoop;

use super::common::TestProject;

const INTERVAL: Duration = Duration::from_millis(50);
const DEADLINE: Duration = Duration::from_secs(10);

/// Dispatch watcher events until `done` holds or the deadline passes.
fn pump_until(watch: &mut WatchLoop, kernel: &Kernel, done: impl Fn() -> bool) -> bool {
  let started = Instant::now();
  while started.elapsed() < DEADLINE {
    watch.process_pending(kernel, INTERVAL * 4).unwrap();
    if done() {
      return true;
    }
  }
  false
}

#[test]
fn created_template_is_rendered() {
  let project = TestProject::new("core:\n  project:\n    name: watch1\n");
  project.write("test.txt.jinja", "This is {{core.project.name}} project.");

  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();
  let mut watch = WatchLoop::with_interval(&kernel, INTERVAL).unwrap();

  project.write("test.created.txt.jinja", "Created in {{core.project.name}}.");
  let rendered = pump_until(&mut watch, &kernel, || project.exists("test.created.txt"));

  assert!(rendered, "test.created.txt never appeared");
  assert_eq!(project.read("test.created.txt"), "Created in watch1.");
  assert_eq!(project.ignored(), ["/test.created.txt", "/test.txt"]);
}

#[test]
fn modified_template_matches_a_second_run() {
  let watched = TestProject::new("core:\n  project:\n    name: watch1\n");
  let rerun = TestProject::new("core:\n  project:\n    name: watch1\n");
  for project in [&watched, &rerun] {
    project.write("test.txt.jinja", "v1 {{core.project.name}}");
  }

  let kernel = watched.kernel();
  kernel.execute_command("configure").unwrap();
  let mut watch = WatchLoop::with_interval(&kernel, INTERVAL).unwrap();
  watched.write("test.txt.jinja", "version two of {{core.project.name}}");
  let updated = pump_until(&mut watch, &kernel, || {
    watched.exists("test.txt") && watched.read("test.txt").starts_with("version two")
  });
  assert!(updated, "test.txt was not re-rendered");

  let kernel = rerun.kernel();
  kernel.execute_command("configure").unwrap();
  rerun.write("test.txt.jinja", "version two of {{core.project.name}}");
  kernel.execute_command("configure").unwrap();

  assert_eq!(watched.read("test.txt"), rerun.read("test.txt"));
  assert_eq!(watched.ignored(), rerun.ignored());
}

#[test]
fn deleted_template_removes_its_target() {
  let project = TestProject::new("");
  project.write("gone.txt.jinja", "bye");

  let kernel = project.kernel();
  kernel.execute_command("configure").unwrap();
  assert!(project.exists("gone.txt"));

  let mut watch = WatchLoop::with_interval(&kernel, INTERVAL).unwrap();
  project.remove("gone.txt.jinja");
  let removed = pump_until(&mut watch, &kernel, || !project.exists("gone.txt"));

  assert!(removed, "gone.txt was kept");
  assert!(project.ignored().is_empty());
}

#[test]
fn run_returns_once_stopped() {
  let project = TestProject::new("");
  let kernel = project.kernel();
  let mut watch = WatchLoop::with_interval(&kernel, INTERVAL).unwrap();
  let stop = AtomicBool::new(true);
  watch.run(&kernel, &stop).unwrap();
}
