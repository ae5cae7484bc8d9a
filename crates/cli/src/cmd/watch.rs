use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use ddb_lib::kernel::Kernel;
use ddb_lib::watch::WatchLoop;
use tracing::info;

use crate::output::print_info;

/// Watch the project until Ctrl-C.
///
/// The kernel stays on this thread; the signal is awaited on the runtime's
/// workers and only flips the stop flag.
pub fn cmd_watch(kernel: &Kernel) -> Result<()> {
  let stop = Arc::new(AtomicBool::new(false));
  let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  let flag = stop.clone();
  runtime.spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("interrupt received");
      flag.store(true, Ordering::SeqCst);
    }
  });

  let mut watch = WatchLoop::new(kernel).context("Failed to start the file watcher")?;
  print_info(&format!(
    "Watching {} for changes, press Ctrl-C to stop",
    kernel.project_home().display()
  ));
  watch.run(kernel, &stop).context("File watcher stopped")?;
  Ok(())
}
