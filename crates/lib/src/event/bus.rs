//! Synchronous publish/subscribe.
//!
//! Listeners for a topic run in ascending `order`, ties broken by
//! subscription order, followed by the wildcard listeners. The listener list
//! is snapshotted when an emission starts, so a listener subscribed during an
//! emission only sees later emissions. Listeners may emit re-entrantly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use super::Event;
use crate::action::ActionError;

/// A bus listener. `C` is the context handed to every listener.
pub type Listener<C> = Rc<dyn Fn(&C, &Event) -> Result<(), ActionError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription<C> {
  id: ListenerId,
  /// `None` for wildcard listeners.
  topic: Option<String>,
  order: i32,
  listener: Listener<C>,
}

pub struct EventBus<C> {
  subscriptions: RefCell<Vec<Subscription<C>>>,
  next_id: Cell<u64>,
}

impl<C> Default for EventBus<C> {
  fn default() -> Self {
    Self {
      subscriptions: RefCell::new(Vec::new()),
      next_id: Cell::new(0),
    }
  }
}

impl<C> EventBus<C> {
  pub fn new() -> Self {
    Self::default()
  }

  fn add(&self, topic: Option<String>, order: i32, listener: Listener<C>) -> ListenerId {
    let id = ListenerId(self.next_id.get());
    self.next_id.set(id.0 + 1);
    self.subscriptions.borrow_mut().push(Subscription {
      id,
      topic,
      order,
      listener,
    });
    id
  }

  /// Listen to `topic`.
  pub fn subscribe(&self, topic: &str, order: i32, listener: Listener<C>) -> ListenerId {
    trace!(topic, order, "listener subscribed");
    self.add(Some(topic.to_string()), order, listener)
  }

  /// Listen to every topic.
  pub fn subscribe_all(&self, listener: Listener<C>) -> ListenerId {
    self.add(None, 0, listener)
  }

  /// Returns whether a listener was removed.
  pub fn unsubscribe(&self, id: ListenerId) -> bool {
    let mut subscriptions = self.subscriptions.borrow_mut();
    let before = subscriptions.len();
    subscriptions.retain(|s| s.id != id);
    subscriptions.len() != before
  }

  /// Number of listeners that would receive an event on `topic`, wildcards
  /// included.
  pub fn listener_count(&self, topic: &str) -> usize {
    self
      .subscriptions
      .borrow()
      .iter()
      .filter(|s| s.topic.as_deref().is_none_or(|t| t == topic))
      .count()
  }

  pub fn clear(&self) {
    self.subscriptions.borrow_mut().clear();
  }

  /// Deliver `event` to its listeners. The first listener error stops the
  /// emission and is returned.
  pub fn emit(&self, context: &C, event: &Event) -> Result<(), ActionError> {
    let topic = event.topic();
    let listeners = self.snapshot(&topic);
    trace!(topic = %topic, listeners = listeners.len(), "emit");
    for listener in listeners {
      listener(context, event)?;
    }
    Ok(())
  }

  fn snapshot(&self, topic: &str) -> Vec<Listener<C>> {
    let subscriptions = self.subscriptions.borrow();

    // Subscription order is the vector order; the sort is stable.
    let mut named: Vec<&Subscription<C>> = subscriptions
      .iter()
      .filter(|s| s.topic.as_deref() == Some(topic))
      .collect();
    named.sort_by_key(|s| s.order);

    named
      .into_iter()
      .chain(subscriptions.iter().filter(|s| s.topic.is_none()))
      .map(|s| s.listener.clone())
      .collect()
  }
}
