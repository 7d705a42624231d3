//! Declarative event wiring.
//!
//! A static table of [`Binding`]s says which handler runs for which event on
//! which part of the scene. Handler names are resolved once, when the router
//! is built, so a typo in the table fails at startup rather than on click.

use std::collections::HashMap;

use log::{debug, trace};

use super::error::{Error, Result};
use super::events::TopologyEvent;
use super::interaction::MenuAction;
use super::topology::Topology;

/// Where an event comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
	/// Pointer events delegated to whatever the pointer is over.
	Scene,
	/// Events bound straight onto rendered elements, often namespaced
	/// (`mousedown.addrel`).
	Direct,
	/// Window and application level events.
	App,
}

/// What was under the pointer.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
	Service(String),
	ServiceStatus(String),
	RelationLabel(String),
	MenuItem(MenuAction, String),
	Background,
}

impl Target {
	pub fn service_id(&self) -> Option<&str> {
		match self {
			Target::Service(id) | Target::ServiceStatus(id) | Target::MenuItem(_, id) => Some(id),
			Target::RelationLabel(_) | Target::Background => None,
		}
	}
}

/// The part of the scene a binding listens on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
	Service,
	ServiceStatus,
	RelationLabel,
	ViewService,
	DestroyService,
	/// The empty canvas behind everything.
	Background,
	/// The gesture-capturing plane; same extent as the background.
	ZoomPlane,
	Window,
}

impl Selector {
	pub fn css(self) -> &'static str {
		match self {
			Selector::Service => ".service",
			Selector::ServiceStatus => ".service-status",
			Selector::RelationLabel => ".rel-label",
			Selector::ViewService => ".view-service",
			Selector::DestroyService => ".destroy-service",
			Selector::Background => ".topology .crosshatch-background rect:first-child",
			Selector::ZoomPlane => ".zoom-plane",
			Selector::Window => "window",
		}
	}

	pub fn matches(self, target: &Target) -> bool {
		match (self, target) {
			(Selector::Window, _) => true,
			(Selector::Service, Target::Service(_) | Target::ServiceStatus(_)) => true,
			(Selector::ServiceStatus, Target::ServiceStatus(_)) => true,
			(Selector::RelationLabel, Target::RelationLabel(_)) => true,
			(Selector::ViewService, Target::MenuItem(MenuAction::View, _)) => true,
			(Selector::DestroyService, Target::MenuItem(MenuAction::Destroy, _)) => true,
			(Selector::Background | Selector::ZoomPlane, Target::Background) => true,
			_ => false,
		}
	}
}

/// A pointer or application event as handlers see it.
#[derive(Clone, Debug, PartialEq)]
pub struct PointerEvent {
	pub target: Target,
	/// Canvas-relative position.
	pub screen: (f64, f64),
	/// Milliseconds, monotonic.
	pub time_ms: f64,
	pub wheel_delta: f64,
}

impl PointerEvent {
	pub fn new(target: Target, screen: (f64, f64), time_ms: f64) -> Self {
		Self {
			target,
			screen,
			time_ms,
			wheel_delta: 0.0,
		}
	}

	/// An event with no pointer position, e.g. a window resize.
	pub fn app(time_ms: f64) -> Self {
		Self::new(Target::Background, (0.0, 0.0), time_ms)
	}
}

pub type Handler = fn(&mut Topology, &PointerEvent);

/// One row of the interaction table.
#[derive(Clone, Copy, Debug)]
pub struct Binding {
	pub source: Source,
	pub selector: Selector,
	pub event: &'static str,
	pub handler: &'static str,
}

struct Resolved {
	source: Source,
	selector: Selector,
	event: &'static str,
	name: &'static str,
	handler: Handler,
}

pub struct EventRouter {
	bindings: Vec<Resolved>,
}

/// `mousedown` fires bindings for `mousedown` and every `mousedown.<ns>`.
fn event_matches(bound: &str, fired: &str) -> bool {
	bound == fired || bound.split_once('.').is_some_and(|(base, _)| base == fired)
}

impl EventRouter {
	pub fn new(table: &[Binding], registry: &HashMap<&'static str, Handler>) -> Result<Self> {
		let bindings = table
			.iter()
			.map(|b| {
				let handler = *registry.get(b.handler).ok_or(Error::UnknownHandler {
					name: b.handler,
					selector: b.selector.css(),
					event: b.event,
				})?;
				Ok(Resolved {
					source: b.source,
					selector: b.selector,
					event: b.event,
					name: b.handler,
					handler,
				})
			})
			.collect::<Result<Vec<_>>>()?;
		debug!("topology: {} event bindings resolved", bindings.len());
		Ok(Self { bindings })
	}

	/// Run every handler bound to `event` from `source` on the event's target.
	/// Returns how many ran.
	pub fn dispatch(&self, topology: &mut Topology, source: Source, event: &str, ev: &PointerEvent) -> usize {
		let mut ran = 0;
		for b in &self.bindings {
			if b.source == source && event_matches(b.event, event) && b.selector.matches(&ev.target) {
				trace!("topology: {} {} -> {}", b.selector.css(), b.event, b.name);
				(b.handler)(topology, ev);
				ran += 1;
			}
		}
		ran
	}

	/// Re-dispatch processed topology events that application level bindings
	/// listen for: `rescaled` after the view moved, and `toggleControlPanel`
	/// when the application switches to another view of a service.
	pub fn relay(&self, topology: &mut Topology, events: &[TopologyEvent], time_ms: f64) -> usize {
		events
			.iter()
			.filter_map(|event| match event {
				TopologyEvent::Rescaled => Some("rescaled"),
				TopologyEvent::ShowService { .. } | TopologyEvent::ChangeState(_) => {
					Some("toggleControlPanel")
				}
				_ => None,
			})
			.map(|name| self.dispatch(topology, Source::App, name, &PointerEvent::app(time_ms)))
			.sum()
	}

	pub fn len(&self) -> usize {
		self.bindings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn noop(_: &mut Topology, _: &PointerEvent) {}

	#[test]
	fn unknown_handler_fails_construction() {
		let table = [
			Binding {
				source: Source::Scene,
				selector: Selector::Service,
				event: "click",
				handler: "serviceClick",
			},
			Binding {
				source: Source::Scene,
				selector: Selector::Service,
				event: "dblclick",
				handler: "serviceDblClik",
			},
		];
		let registry = HashMap::from([("serviceClick", noop as Handler)]);
		match EventRouter::new(&table, &registry) {
			Err(Error::UnknownHandler { name, selector, event }) => {
				assert_eq!(name, "serviceDblClik");
				assert_eq!(selector, ".service");
				assert_eq!(event, "dblclick");
			}
			Err(other) => panic!("unexpected error {other}"),
			Ok(_) => panic!("router built with a dangling handler"),
		}
	}

	#[test]
	fn namespaced_events_match_their_base_name() {
		assert!(event_matches("mousedown.addrel", "mousedown"));
		assert!(event_matches("mousedown", "mousedown"));
		assert!(!event_matches("mousedown.addrel", "mouseup"));
		assert!(!event_matches("mousedown", "mousedown.addrel"));
	}

	#[test]
	fn selectors_match_their_targets() {
		let service = Target::Service("mysql".into());
		assert!(Selector::Service.matches(&service));
		assert!(!Selector::Background.matches(&service));
		assert!(Selector::Window.matches(&service));
		assert!(Selector::ZoomPlane.matches(&Target::Background));
		assert!(Selector::DestroyService.matches(&Target::MenuItem(MenuAction::Destroy, "mysql".into())));
		assert!(!Selector::ViewService.matches(&Target::MenuItem(MenuAction::Destroy, "mysql".into())));
	}
}
