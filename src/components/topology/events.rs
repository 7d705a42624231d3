use std::collections::VecDeque;

use log::trace;

use super::panzoom::ZoomRequest;

/// Application state changes requested by the canvas.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
	/// Ask the user to confirm destroying a service.
	DestroyConfirm { service: String },
}

/// Semantic events fired by topology modules. Some are consumed internally
/// (zooming, panning), all of them are forwarded to the host application.
#[derive(Clone, Debug, PartialEq)]
pub enum TopologyEvent {
	ShowService { service: String },
	ChangeState(StateChange),
	ClearState,
	SnapToService { service: String },
	SnapOutOfService,
	AddRelationDragStart { service: String },
	AddRelation { source: String, target: String },
	CancelRelationBuild,
	ServiceMoved { service: String },
	Zoom(ZoomRequest),
	Rescaled,
	PanToCenter,
	PanToPoint { point: (f64, f64), center: bool },
	BeforePageSizeRecalculation,
	AfterPageSizeRecalculation,
}

/// FIFO of fired events waiting to be processed.
#[derive(Debug, Default)]
pub struct EventBus {
	queue: VecDeque<TopologyEvent>,
}

impl EventBus {
	pub fn fire(&mut self, event: TopologyEvent) {
		trace!("topology: fire {event:?}");
		self.queue.push_back(event);
	}

	pub fn next(&mut self) -> Option<TopologyEvent> {
		self.queue.pop_front()
	}

	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}

	pub fn drain(&mut self) -> Vec<TopologyEvent> {
		self.queue.drain(..).collect()
	}
}
