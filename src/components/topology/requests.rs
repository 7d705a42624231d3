//! Tracking of in-flight remote calls so they can be aborted on teardown.

use std::cell::Cell;
use std::rc::Rc;

use log::debug;

/// A cancellable remote call.
pub trait RequestHandle {
	fn abort(&mut self);
}

/// Handles of requests issued by a view, plus a liveness flag shared with
/// the callbacks of those requests.
pub struct PendingRequests {
	alive: Rc<Cell<bool>>,
	handles: Vec<Box<dyn RequestHandle>>,
}

impl Default for PendingRequests {
	fn default() -> Self {
		Self {
			alive: Rc::new(Cell::new(true)),
			handles: Vec::new(),
		}
	}
}

impl PendingRequests {
	pub fn track(&mut self, handle: Box<dyn RequestHandle>) {
		if self.alive.get() {
			self.handles.push(handle);
		} else {
			let mut handle = handle;
			handle.abort();
		}
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	/// Wrap a callback so it becomes a no-op once [`Self::abort_all`] has run.
	pub fn guard<T: 'static>(&self, callback: impl FnOnce(T) + 'static) -> impl FnOnce(T) + 'static {
		let alive = self.alive.clone();
		move |value| {
			if alive.get() {
				callback(value);
			} else {
				debug!("topology: dropping response for a torn down view");
			}
		}
	}

	/// Abort every tracked request, once, and disarm guarded callbacks.
	pub fn abort_all(&mut self) {
		self.alive.set(false);
		for mut handle in self.handles.drain(..) {
			handle.abort();
		}
	}
}

impl Drop for PendingRequests {
	fn drop(&mut self) {
		self.abort_all();
	}
}
