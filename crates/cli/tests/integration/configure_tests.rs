//! `ddb configure` against a real project directory.

use predicates::prelude::*;

use super::common::TestEnv;

const PROJECT: &str = "core:\n  project:\n    name: cli\n";

#[test]
fn configure_renders_templates() {
  let env = TestEnv::new(PROJECT);
  env.write_file("test.txt.jinja", "This is {{ core.project.name }} project.");

  env.ddb_cmd().arg("configure").assert().success();

  assert_eq!(env.read_file("test.txt"), "This is cli project.");
  assert!(env.read_file(".gitignore").contains("/test.txt"));
}

#[test]
fn configure_remembers_generated_files_between_runs() {
  let env = TestEnv::new(PROJECT);
  env.write_file("test.txt.jinja", "generated");

  env.ddb_cmd().arg("configure").assert().success();
  assert!(env.exists("test.txt"));

  env.remove_file("test.txt.jinja");
  env.ddb_cmd().arg("configure").assert().success();

  assert!(!env.exists("test.txt"));
  assert_eq!(env.read_file(".gitignore"), "");
}

#[test]
fn clear_cache_forgets_generated_files() {
  let env = TestEnv::new(PROJECT);
  env.write_file("test.txt.jinja", "generated");
  env.ddb_cmd().arg("configure").assert().success();

  env.remove_file("test.txt.jinja");
  env.ddb_cmd().args(["--clear-cache", "configure"]).assert().success();

  assert!(env.exists("test.txt"));
}

#[test]
fn failed_templates_set_the_exit_code() {
  let env = TestEnv::new(PROJECT);
  env.write_file("broken.txt.jinja", "{{ missing.key }}");
  env.write_file("fine.txt.jinja", "{{ core.project.name }}");

  env
    .ddb_cmd()
    .arg("configure")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("1 action failed"))
    .stderr(predicate::str::contains("jinja.render"));

  assert_eq!(env.read_file("fine.txt"), "cli");
  assert!(!env.exists("broken.txt"));
}

#[test]
fn fail_fast_aborts_the_command() {
  let env = TestEnv::new(PROJECT);
  env.write_file("broken.txt.jinja", "{{ missing.key }}");

  env
    .ddb_cmd()
    .args(["--fail-fast", "configure"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Command 'configure' failed"));
}

#[test]
fn invalid_configuration_is_fatal() {
  let env = TestEnv::new("core: [unclosed\n");

  env.ddb_cmd().arg("configure").assert().code(1).stderr(predicate::str::contains("configuration"));
}
