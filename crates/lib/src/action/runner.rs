//! Invocation of actions from bus emissions.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, error, info_span, trace};

use super::{Action, ActionError, ActionFailure, EventBinding, Processed};
use crate::event::{Event, Listener};
use crate::kernel::Kernel;

/// Runtime state shared by every binding of one registered action.
pub struct ActionHandle {
  pub action: Rc<dyn Action>,
  initialized: Cell<bool>,
  in_flight: RefCell<Vec<Event>>,
}

impl ActionHandle {
  pub fn new(action: Rc<dyn Action>) -> Rc<Self> {
    Rc::new(Self {
      action,
      initialized: Cell::new(false),
      in_flight: RefCell::new(Vec::new()),
    })
  }

  pub fn is_initialized(&self) -> bool {
    self.initialized.get()
  }

  fn ensure_initialized(&self, kernel: &Kernel) -> Result<(), ActionError> {
    if self.action.initializable() && !self.initialized.get() {
      trace!(action = %self.action.name(), "initializing");
      self.action.initialize(kernel)?;
      self.initialized.set(true);
    }
    Ok(())
  }
}

/// Removes an event from the in-flight list when dropped.
struct InFlight<'a> {
  handle: &'a ActionHandle,
  event: Event,
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    let mut in_flight = self.handle.in_flight.borrow_mut();
    if let Some(pos) = in_flight.iter().rposition(|e| *e == self.event) {
      in_flight.remove(pos);
    }
  }
}

/// Build the bus listener running `binding` for `handle`.
pub fn listener(handle: Rc<ActionHandle>, binding: EventBinding) -> Listener<Kernel> {
  Rc::new(move |kernel: &Kernel, event: &Event| run(kernel, &handle, &binding, event))
}

/// Run one binding of an action for one emission.
///
/// Failures are recorded on the kernel and swallowed unless fail-fast is on.
pub fn run(kernel: &Kernel, handle: &ActionHandle, binding: &EventBinding, event: &Event) -> Result<(), ActionError> {
  let name = handle.action.name().to_string();

  if handle.in_flight.borrow().contains(event) {
    debug!(action = %name, event = %event, "already running for this event, skipping");
    return Ok(());
  }

  let _context = kernel.enter_action(&name);
  let span = info_span!("action", name = %name);
  let _span = span.enter();

  handle.in_flight.borrow_mut().push(event.clone());
  let _in_flight = InFlight {
    handle,
    event: event.clone(),
  };

  let result = invoke(kernel, handle, binding, event);

  match result {
    Ok(()) => Ok(()),
    Err(e) => {
      error!(action = %name, event = %event, "{}", e);
      debug!(action = %name, chain = ?error_chain(&e), "action error chain");
      kernel.record_failure(ActionFailure {
        action: name,
        event: event.topic(),
        message: e.to_string(),
      });
      if kernel.fail_fast() { Err(e) } else { Ok(()) }
    }
  }
}

fn invoke(kernel: &Kernel, handle: &ActionHandle, binding: &EventBinding, event: &Event) -> Result<(), ActionError> {
  handle.ensure_initialized(kernel)?;

  let rewritten;
  let event = match &binding.processor {
    None => event,
    Some(processor) => match processor(kernel, event) {
      Processed::Veto => {
        trace!(action = %handle.action.name(), event = %event, "vetoed by processor");
        return Ok(());
      }
      Processed::Pass => event,
      Processed::Rewrite(new) => {
        rewritten = new;
        &rewritten
      }
    },
  };

  match &binding.call {
    Some(call) => call(kernel, event),
    None => handle.action.execute(kernel, event),
  }
}

fn error_chain(error: &dyn std::error::Error) -> Vec<String> {
  let mut chain = Vec::new();
  let mut source = error.source();
  while let Some(cause) = source {
    chain.push(cause.to_string());
    source = cause.source();
  }
  chain
}
