use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
	Info,
	Warning,
	Error,
}

/// A message for the user about something that happened out of band.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
	pub title: String,
	pub message: String,
	pub severity: Severity,
}

type Listener = Rc<dyn Fn(&Notification)>;

#[derive(Default)]
struct Inner {
	list: RefCell<Vec<Notification>>,
	listeners: RefCell<Vec<Listener>>,
}

/// Shared, append-only list of notifications. Clones share the same list.
#[derive(Clone, Default)]
pub struct Notifications(Rc<Inner>);

impl fmt::Debug for Notifications {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Notifications")
			.field("list", &self.0.list.borrow())
			.field("listeners", &self.0.listeners.borrow().len())
			.finish()
	}
}

impl Notifications {
	pub fn add(&self, title: impl Into<String>, message: impl Into<String>, severity: Severity) {
		let notification = Notification {
			title: title.into(),
			message: message.into(),
			severity,
		};
		match severity {
			Severity::Info => info!("{}: {}", notification.title, notification.message),
			Severity::Warning => warn!("{}: {}", notification.title, notification.message),
			Severity::Error => error!("{}: {}", notification.title, notification.message),
		}
		self.0.list.borrow_mut().push(notification.clone());
		// Listeners may subscribe or add in turn.
		let listeners = self.0.listeners.borrow().clone();
		for listener in listeners {
			listener(&notification);
		}
	}

	/// Call `listener` for every notification added from now on.
	pub fn subscribe(&self, listener: impl Fn(&Notification) + 'static) {
		self.0.listeners.borrow_mut().push(Rc::new(listener));
	}

	pub fn all(&self) -> Vec<Notification> {
		self.0.list.borrow().clone()
	}

	pub fn len(&self) -> usize {
		self.0.list.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.list.borrow().is_empty()
	}
}
