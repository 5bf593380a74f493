//! Named notification fan-out.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tandem_rpc::Value;

type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

#[derive(Default)]
struct Registry {
	next_id: u64,
	handlers: HashMap<String, Vec<(u64, Handler)>>,
}

/// Routes notifications to the handlers subscribed to their name.
///
/// Handlers run on the dispatching task in registration order. Each dispatch
/// works on a snapshot: handlers added or removed while it runs take effect
/// from the next dispatch on.
#[derive(Clone, Default)]
pub struct EventDispatcher {
	registry: Arc<Mutex<Registry>>,
}

impl fmt::Debug for EventDispatcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let registry = self.registry.lock();
		f.debug_struct("EventDispatcher")
			.field("names", &registry.handlers.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl EventDispatcher {
	/// Creates an empty dispatcher.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `handler` for notifications named `name`. The handler stays
	/// registered until the returned subscription is released or dropped.
	pub fn subscribe(&self, name: impl Into<String>, handler: impl Fn(&[Value]) + Send + Sync + 'static) -> Subscription {
		let name = name.into();
		let mut registry = self.registry.lock();
		let id = registry.next_id;
		registry.next_id += 1;
		registry
			.handlers
			.entry(name.clone())
			.or_default()
			.push((id, Arc::new(handler)));
		Subscription {
			registry: Arc::downgrade(&self.registry),
			name,
			id,
			active: true,
		}
	}

	/// Calls every handler registered for `name`; returns how many ran.
	pub fn dispatch(&self, name: &str, args: &[Value]) -> usize {
		let snapshot: Vec<Handler> = match self.registry.lock().handlers.get(name) {
			Some(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
			None => return 0,
		};
		for handler in &snapshot {
			handler(args);
		}
		snapshot.len()
	}

	/// Number of handlers currently registered for `name`.
	pub fn handler_count(&self, name: &str) -> usize {
		self.registry.lock().handlers.get(name).map_or(0, Vec::len)
	}
}

/// Registration of one handler; deregisters on [`Subscription::unsubscribe`]
/// or drop, whichever comes first.
#[must_use = "the handler is removed as soon as the subscription is dropped"]
pub struct Subscription {
	registry: Weak<Mutex<Registry>>,
	name: String,
	id: u64,
	active: bool,
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("name", &self.name)
			.field("active", &self.active)
			.finish()
	}
}

impl Subscription {
	/// Name the handler listens to.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Removes the handler. Idempotent.
	pub fn unsubscribe(&mut self) {
		if !std::mem::take(&mut self.active) {
			return;
		}
		let Some(registry) = self.registry.upgrade() else {
			return;
		};
		let mut registry = registry.lock();
		if let Some(handlers) = registry.handlers.get_mut(&self.name) {
			handlers.retain(|(id, _)| *id != self.id);
			if handlers.is_empty() {
				registry.handlers.remove(&self.name);
			}
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.unsubscribe();
	}
}
