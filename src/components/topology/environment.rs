//! The remote side of annotation writes.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use log::debug;

use super::model::{Annotations, Database};
use super::requests::RequestHandle;

/// Kind of entity an annotation belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
	Application,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RemoteError(pub String);

pub type AnnotationCallback = Box<dyn FnOnce(Result<(), RemoteError>)>;

/// Operations the topology needs from the Juju environment connection.
pub trait Environment {
	/// Merge `data` into the annotations of entity `id`. The callback runs
	/// when the environment answers; the returned handle can abort the call.
	fn update_annotations(
		&self,
		id: &str,
		kind: EntityKind,
		data: Annotations,
		callback: AnnotationCallback,
	) -> Box<dyn RequestHandle>;

	/// Deliver whatever responses have arrived. Returns how many callbacks ran.
	fn poll(&self) -> usize {
		0
	}
}

struct QueuedWrite {
	id: String,
	data: Annotations,
	callback: AnnotationCallback,
	aborted: Rc<Cell<bool>>,
}

struct QueuedHandle(Rc<Cell<bool>>);

impl RequestHandle for QueuedHandle {
	fn abort(&mut self) {
		self.0.set(true);
	}
}

/// An environment that answers asynchronously, one [`flush`](Self::flush)
/// later, by writing into a local database. Used when no controller is
/// connected.
pub struct SimulatedEnvironment {
	db: Rc<RefCell<Database>>,
	queue: RefCell<VecDeque<QueuedWrite>>,
	/// Service ids whose writes fail.
	failing: RefCell<Vec<String>>,
}

impl SimulatedEnvironment {
	pub fn new(db: Rc<RefCell<Database>>) -> Self {
		Self {
			db,
			queue: RefCell::new(VecDeque::new()),
			failing: RefCell::new(Vec::new()),
		}
	}

	pub fn fail_writes_for(&self, id: &str) {
		self.failing.borrow_mut().push(id.to_string());
	}

	pub fn in_flight(&self) -> usize {
		self.queue.borrow().len()
	}

	/// Answer every queued call, in issue order. Returns how many callbacks ran.
	pub fn flush(&self) -> usize {
		let mut answered = 0;
		loop {
			let Some(write) = self.queue.borrow_mut().pop_front() else {
				break;
			};
			if write.aborted.get() {
				debug!("topology: dropping aborted annotation write for {}", write.id);
				continue;
			}
			let result = if self.failing.borrow().contains(&write.id) {
				Err(RemoteError(format!("annotations for {} were rejected", write.id)))
			} else {
				if let Some(service) = self.db.borrow_mut().service_mut(&write.id) {
					service.annotations.extend(write.data);
				}
				Ok(())
			};
			(write.callback)(result);
			answered += 1;
		}
		answered
	}
}

impl Environment for SimulatedEnvironment {
	fn update_annotations(
		&self,
		id: &str,
		_kind: EntityKind,
		data: Annotations,
		callback: AnnotationCallback,
	) -> Box<dyn RequestHandle> {
		let aborted = Rc::new(Cell::new(false));
		self.queue.borrow_mut().push_back(QueuedWrite {
			id: id.to_string(),
			data,
			callback,
			aborted: aborted.clone(),
		});
		Box::new(QueuedHandle(aborted))
	}

	fn poll(&self) -> usize {
		self.flush()
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::components::topology::model::Service;

	fn env() -> SimulatedEnvironment {
		let mut db = Database::default();
		db.add_service(Service {
			id: "mysql".into(),
			..Default::default()
		});
		SimulatedEnvironment::new(Rc::new(RefCell::new(db)))
	}

	fn gui_x(x: f64) -> Annotations {
		Annotations::from([("gui-x".to_string(), json!(x))])
	}

	#[test]
	fn answers_arrive_on_flush_in_issue_order() {
		let env = env();
		let seen = Rc::new(RefCell::new(Vec::new()));
		for x in [1.0, 2.0] {
			let seen = seen.clone();
			env.update_annotations(
				"mysql",
				EntityKind::Application,
				gui_x(x),
				Box::new(move |r| seen.borrow_mut().push((x, r.is_ok()))),
			);
		}
		assert_eq!(env.in_flight(), 2);
		assert!(seen.borrow().is_empty());
		assert_eq!(env.poll(), 2);
		assert_eq!(*seen.borrow(), vec![(1.0, true), (2.0, true)]);
		assert_eq!(env.db.borrow().service("mysql").unwrap().annotations["gui-x"], json!(2.0));
	}

	#[test]
	fn aborted_writes_are_dropped() {
		let env = env();
		let mut handle = env.update_annotations(
			"mysql",
			EntityKind::Application,
			gui_x(9.0),
			Box::new(|_| panic!("aborted callback ran")),
		);
		handle.abort();
		assert_eq!(env.flush(), 0);
		assert!(env.db.borrow().service("mysql").unwrap().annotations.is_empty());
	}
}
