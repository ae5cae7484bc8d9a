use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use ddb_lib::config::{self, ConfigRoots};
use ddb_lib::event::Event;
use ddb_lib::features::builtin_features;
use ddb_lib::kernel::{Kernel, KernelOptions};
use ddb_lib::platform::paths;
use tracing::{debug, warn};

use crate::app::{self, Globals};
use crate::cmd::cmd_watch;
use crate::output::{format_duration, print_failures};

/// Load configuration and features, dispatch the invoked command and report
/// recorded failures through the exit code.
pub fn cmd_main(args: Vec<String>, globals: &Globals) -> Result<ExitCode> {
  let roots = ConfigRoots::from_env();
  debug!(project = %roots.project.display(), "loading configuration");
  let config = config::load(&roots).context("Failed to load configuration")?;

  let options = KernelOptions {
    fail_fast: globals.fail_fast,
    eject: false,
    clear_cache: globals.clear_cache,
    cache_dir: Some(paths::cache_dir()),
  };
  let kernel = Kernel::new(config, options).context("Failed to start")?;
  kernel
    .load_features(builtin_features())
    .context("Failed to load features")?;

  let mut command = app::command(&kernel);
  let matches = command.clone().get_matches_from(args);

  if globals.version {
    kernel.emit(&Event::MainVersion).context("Failed to print version")?;
    return finish(&kernel);
  }

  let Some((name, sub_matches)) = app::invoked(&matches) else {
    if globals.watch {
      kernel.emit(&Event::MainStart)?;
      cmd_watch(&kernel)?;
      kernel.emit(&Event::MainTerminate)?;
      return finish(&kernel);
    }
    command.print_help().context("Failed to print help")?;
    return Ok(ExitCode::SUCCESS);
  };

  kernel.emit(&Event::MainStart).context("Failed to start")?;
  kernel.set_arguments(app::arguments(&kernel, &name, sub_matches));

  let started = Instant::now();
  let result = kernel.execute_command(&name);
  debug!(command = %name, elapsed = %format_duration(started.elapsed()), "command finished");
  if let Err(e) = result {
    if let Err(close) = kernel.shutdown() {
      warn!(error = %close, "failed to close caches");
    }
    return Err(anyhow::Error::new(e).context(format!("Command '{}' failed", name)));
  }

  if globals.watch {
    cmd_watch(&kernel)?;
  }

  kernel.emit(&Event::MainTerminate).context("Failed to terminate")?;
  finish(&kernel)
}

fn finish(kernel: &Kernel) -> Result<ExitCode> {
  kernel.shutdown().context("Failed to close caches")?;

  let failures = kernel.failures();
  if failures.is_empty() {
    Ok(ExitCode::SUCCESS)
  } else {
    print_failures(&failures);
    Ok(ExitCode::FAILURE)
  }
}
