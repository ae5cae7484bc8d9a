//! `ddb run` and the binaries it knows about.

use predicates::prelude::*;

use super::common::TestEnv;

const BINARIES: &str = "run:\n  binaries:\n    npm:\n      command: [docker, compose, run, --rm, node, npm]\n      workdir: /app\n";

#[test]
fn run_prints_the_command_line() {
  let env = TestEnv::new(BINARIES);

  env
    .ddb_cmd()
    .args(["run", "npm", "install", "--save-dev", "left pad"])
    .assert()
    .success()
    .stdout("cd /app && docker compose run --rm node npm install --save-dev 'left pad'\n");
}

#[test]
fn run_writes_a_shim() {
  let env = TestEnv::new(BINARIES);

  env.ddb_cmd().args(["run", "npm"]).assert().success();

  let shim = env.read_file(".bin/npm");
  assert!(shim.starts_with("#!/usr/bin/env sh\n"), "{shim}");
  assert!(shim.contains("exec docker compose run --rm node npm \"$@\""), "{shim}");
}

#[test]
fn run_requires_a_name() {
  let env = TestEnv::new(BINARIES);

  env.ddb_cmd().arg("run").assert().code(2).stderr(predicate::str::contains("<name>"));
}

#[test]
fn run_unknown_binary_fails() {
  let env = TestEnv::new(BINARIES);

  env.ddb_cmd().args(["run", "psql"]).assert().code(1).stderr(predicate::str::contains("psql"));
}
