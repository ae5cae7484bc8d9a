//! Shell integration: `activate`, `deactivate` and `check-activated`.

use predicates::prelude::*;

use super::common::TestEnv;

/// Value of `export NAME=...` in activation output, unquoted.
fn exported(output: &str, name: &str) -> Option<String> {
  let prefix = format!("export {}=", name);
  output
    .lines()
    .find_map(|line| line.strip_prefix(&prefix))
    .map(|value| value.trim_matches('\'').to_string())
}

#[test]
fn activate_prepends_project_directories_to_path() {
  let env = TestEnv::new("");
  let output = env.ddb_cmd().arg("activate").env("PATH", "/usr/bin").assert().success();
  let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();

  let project = env.project_path();
  let expected = format!(
    "{}:{}:/usr/bin",
    project.join(".bin").display(),
    project.join("bin").display()
  );
  assert_eq!(exported(&stdout, "PATH"), Some(expected));
  assert!(exported(&stdout, "DDB_SHELL_ENVIRON_BACKUP").is_some(), "{stdout}");
}

#[test]
fn deactivate_restores_the_saved_environment() {
  let env = TestEnv::new("");
  let output = env.ddb_cmd().arg("activate").env("PATH", "/usr/bin").assert().success();
  let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
  let backup = exported(&stdout, "DDB_SHELL_ENVIRON_BACKUP").unwrap();
  let path = exported(&stdout, "PATH").unwrap();

  env
    .ddb_cmd()
    .arg("deactivate")
    .env("PATH", path)
    .env("DDB_SHELL_ENVIRON_BACKUP", backup)
    .assert()
    .success()
    .stdout(predicate::str::contains("export PATH=/usr/bin\n"))
    .stdout(predicate::str::contains("unset DDB_SHELL_ENVIRON_BACKUP\n"));
}

#[test]
fn check_activated_fails_outside_an_activated_shell() {
  let env = TestEnv::new("");

  env
    .ddb_cmd()
    .arg("check-activated")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("not activated"));
}
