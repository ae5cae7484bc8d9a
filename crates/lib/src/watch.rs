//! Watch mode: turn filesystem changes under the project into file events.
//!
//! An [`Observer`] thread polls the project tree and posts [`FsEvent`]s over
//! a bounded channel. The [`WatchLoop`] runs on the kernel's thread, where
//! it batches whatever arrived, drops duplicates and emits the matching
//! `file:*` events.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, trace, warn};

use crate::action::ActionError;
use crate::event::Event;
use crate::kernel::Kernel;
use crate::walker::{FileWalker, WalkError, WalkOptions};

/// Default time between two polls of the tree.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

const CHANNEL_CAPACITY: usize = 1024;

const STOP_DRAIN_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
  #[error(transparent)]
  Walk(#[from] WalkError),

  #[error(transparent)]
  Action(#[from] ActionError),

  #[error("failed to start the file observer: {0}")]
  Spawn(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FsEvent {
  Created(PathBuf),
  Modified(PathBuf),
  Deleted(PathBuf),
  Moved { from: PathBuf, to: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
  len: u64,
  modified: Option<SystemTime>,
}

type Snapshot = HashMap<PathBuf, Stamp>;

fn snapshot(walker: &FileWalker) -> Snapshot {
  let files = match walker.walk() {
    Ok(files) => files,
    Err(e) => {
      warn!(error = %e, "watch snapshot failed");
      return Snapshot::new();
    }
  };
  files
    .into_iter()
    .filter_map(|path| {
      let metadata = std::fs::metadata(&path).ok()?;
      Some((
        path,
        Stamp {
          len: metadata.len(),
          modified: metadata.modified().ok(),
        },
      ))
    })
    .collect()
}

/// Changes between two snapshots. A deletion and a creation with the same
/// size and modification time are reported as a move.
fn diff(before: &Snapshot, after: &Snapshot) -> Vec<FsEvent> {
  let mut deleted: Vec<&PathBuf> = before.keys().filter(|p| !after.contains_key(*p)).collect();
  let mut created: Vec<&PathBuf> = after.keys().filter(|p| !before.contains_key(*p)).collect();
  let mut modified: Vec<&PathBuf> = after
    .iter()
    .filter(|(path, stamp)| before.get(*path).is_some_and(|old| old != *stamp))
    .map(|(path, _)| path)
    .collect();
  deleted.sort();
  created.sort();
  modified.sort();

  let mut events = Vec::new();
  let mut moved_to: HashSet<&PathBuf> = HashSet::new();
  for from in deleted {
    let stamp = before[from];
    let target = created
      .iter()
      .copied()
      .find(|to| !moved_to.contains(to) && after[*to] == stamp && stamp.modified.is_some());
    match target {
      Some(to) => {
        moved_to.insert(to);
        events.push(FsEvent::Moved {
          from: from.clone(),
          to: to.clone(),
        });
      }
      None => events.push(FsEvent::Deleted(from.clone())),
    }
  }
  events.extend(
    created
      .into_iter()
      .filter(|p| !moved_to.contains(p))
      .map(|p| FsEvent::Created(p.clone())),
  );
  events.extend(modified.into_iter().map(|p| FsEvent::Modified(p.clone())));
  events
}

/// Background poller of a directory tree.
pub struct Observer {
  receiver: Receiver<FsEvent>,
  stop: Arc<AtomicBool>,
  handle: Option<JoinHandle<()>>,
}

impl Observer {
  /// Snapshot the tree now, then poll it every `interval` on a new thread.
  pub fn start(walker: FileWalker, interval: Duration) -> Result<Self, WatchError> {
    let (sender, receiver) = mpsc::sync_channel(CHANNEL_CAPACITY);
    let stop = Arc::new(AtomicBool::new(false));
    let initial = snapshot(&walker);
    debug!(root = %walker.root().display(), files = initial.len(), "observer started");

    let flag = stop.clone();
    let handle = thread::Builder::new()
      .name("ddb-watch".to_string())
      .spawn(move || poll(walker, initial, interval, sender, flag))
      .map_err(WatchError::Spawn)?;

    Ok(Self {
      receiver,
      stop,
      handle: Some(handle),
    })
  }

  pub fn recv_timeout(&self, timeout: Duration) -> Result<FsEvent, RecvTimeoutError> {
    self.receiver.recv_timeout(timeout)
  }

  /// Events already queued, without waiting.
  pub fn pending(&self) -> Vec<FsEvent> {
    self.receiver.try_iter().collect()
  }

  /// Stop polling, wait for the thread and return what it queued.
  ///
  /// The poller may be blocked on a full channel in the middle of a scan, so
  /// the channel keeps being drained until the thread has exited.
  pub fn stop(&mut self) -> Vec<FsEvent> {
    self.stop.store(true, Ordering::SeqCst);
    let mut remaining = Vec::new();
    if let Some(handle) = self.handle.take() {
      while !handle.is_finished() {
        match self.receiver.recv_timeout(STOP_DRAIN_TIMEOUT) {
          Ok(event) => remaining.push(event),
          Err(RecvTimeoutError::Timeout) => {}
          Err(RecvTimeoutError::Disconnected) => break,
        }
      }
      if handle.join().is_err() {
        warn!("observer thread panicked");
      }
    }
    remaining.extend(self.pending());
    remaining
  }
}

impl Drop for Observer {
  fn drop(&mut self) {
    if self.handle.is_some() {
      self.stop();
    }
  }
}

fn poll(walker: FileWalker, mut previous: Snapshot, interval: Duration, sender: SyncSender<FsEvent>, stop: Arc<AtomicBool>) {
  while !stop.load(Ordering::SeqCst) {
    thread::sleep(interval);
    let current = snapshot(&walker);
    for event in diff(&previous, &current) {
      trace!(event = ?event, "filesystem change");
      if sender.send(event).is_err() {
        return;
      }
    }
    previous = current;
  }
}

/// Drop repeated events of one batch, keeping first occurrences in order.
fn dedupe(events: Vec<FsEvent>) -> Vec<FsEvent> {
  let mut seen = HashSet::new();
  events.into_iter().filter(|e| seen.insert(e.clone())).collect()
}

pub struct WatchLoop {
  observer: Observer,
  poll: Duration,
}

impl WatchLoop {
  /// Watch the project tree, honoring the `file` feature's walk settings.
  pub fn new(kernel: &Kernel) -> Result<Self, WatchError> {
    Self::with_interval(kernel, POLL_INTERVAL)
  }

  pub fn with_interval(kernel: &Kernel, interval: Duration) -> Result<Self, WatchError> {
    let root = kernel.project_home();
    let excludes: Option<Vec<String>> = kernel.config().get_as("file.excludes").ok().flatten();
    let mut options = WalkOptions::new(&root);
    if let Some(excludes) = excludes.filter(|e| !e.is_empty()) {
      options = options.excludes(excludes);
    }
    let observer = Observer::start(FileWalker::new(options)?, interval)?;
    Ok(Self {
      observer,
      poll: interval,
    })
  }

  /// Dispatch changes until `stop` is set.
  pub fn run(&mut self, kernel: &Kernel, stop: &AtomicBool) -> Result<(), WatchError> {
    info!("watching for file changes");
    while !stop.load(Ordering::SeqCst) {
      match self.observer.recv_timeout(self.poll) {
        Ok(first) => {
          let mut batch = vec![first];
          batch.extend(self.observer.pending());
          self.dispatch(kernel, batch)?;
        }
        Err(RecvTimeoutError::Timeout) => continue,
        Err(RecvTimeoutError::Disconnected) => break,
      }
    }

    let remaining = self.observer.stop();
    self.dispatch(kernel, remaining)?;
    info!("watch stopped");
    Ok(())
  }

  /// Wait up to `timeout` for changes and dispatch them. Returns how many
  /// events were dispatched.
  pub fn process_pending(&mut self, kernel: &Kernel, timeout: Duration) -> Result<usize, WatchError> {
    let first = match self.observer.recv_timeout(timeout) {
      Ok(event) => event,
      Err(_) => return Ok(0),
    };
    let mut batch = vec![first];
    batch.extend(self.observer.pending());
    let batch = dedupe(batch);
    let count = batch.len();
    self.dispatch(kernel, batch)?;
    Ok(count)
  }

  fn dispatch(&self, kernel: &Kernel, events: Vec<FsEvent>) -> Result<(), WatchError> {
    for event in dedupe(events) {
      debug!(event = ?event, "dispatching");
      match event {
        FsEvent::Created(path) | FsEvent::Modified(path) => found(kernel, path)?,
        FsEvent::Deleted(path) => deleted(kernel, path)?,
        FsEvent::Moved { from, to } => {
          deleted(kernel, from)?;
          found(kernel, to)?;
        }
      }
    }
    Ok(())
  }
}

fn found(kernel: &Kernel, path: PathBuf) -> Result<(), ActionError> {
  if kernel.config().is_config_file(&path) {
    warn!(path = %path.display(), "configuration changed, restart to apply it");
    return Ok(());
  }
  kernel.processed().forget(&path);
  kernel.emit(&Event::FileFound(path))
}

fn deleted(kernel: &Kernel, path: PathBuf) -> Result<(), ActionError> {
  kernel.processed().forget(&path);
  kernel.emit(&Event::FileDeleted(path))
}
