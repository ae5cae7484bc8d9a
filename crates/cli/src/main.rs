mod app;
mod cmd;
mod output;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::app::Globals;
use crate::output::print_error;

fn main() -> ExitCode {
  let args: Vec<String> = std::env::args().collect();
  // The command tree depends on the loaded features, so the flags that shape
  // logging and the kernel are read before clap sees the arguments.
  let globals = Globals::scan(&args);
  init_tracing(&globals);

  match cmd::cmd_main(args, &globals) {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(globals: &Globals) {
  let level = match (globals.silent, globals.verbosity()) {
    (true, _) => "error",
    (false, 0) => "info",
    (false, 1) => "debug",
    (false, _) => "trace",
  };
  let default = format!("warn,ddb={level},ddb_lib={level},ddb_cli={level}");
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .init();
}
