//! The canvas' interaction table and the handlers it names.

use std::collections::HashMap;

use log::warn;

use super::error::Result;
use super::events::{StateChange, TopologyEvent};
use super::router::{Binding, EventRouter, Handler, PointerEvent, Selector, Source, Target};
use super::topology::Topology;

/// Entries of the service control panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
	View,
	Destroy,
}

impl MenuAction {
	pub const ALL: [MenuAction; 2] = [MenuAction::View, MenuAction::Destroy];

	pub fn label(self) -> &'static str {
		match self {
			MenuAction::View => "View",
			MenuAction::Destroy => "Destroy",
		}
	}
}

const fn bind(source: Source, selector: Selector, event: &'static str, handler: &'static str) -> Binding {
	Binding {
		source,
		selector,
		event,
		handler,
	}
}

pub const BINDINGS: &[Binding] = &[
	bind(Source::Scene, Selector::Service, "click", "serviceClick"),
	bind(Source::Scene, Selector::Service, "dblclick", "serviceDblClick"),
	bind(Source::Scene, Selector::Service, "mouseenter", "serviceMouseEnter"),
	bind(Source::Scene, Selector::Service, "mouseleave", "serviceMouseLeave"),
	bind(Source::Scene, Selector::ServiceStatus, "mouseover", "showUnitCount"),
	bind(Source::Scene, Selector::ServiceStatus, "mouseout", "hideUnitCount"),
	bind(Source::Scene, Selector::RelationLabel, "mousemove", "mousemove"),
	bind(Source::Scene, Selector::Background, "click", "backgroundClick"),
	bind(Source::Scene, Selector::Background, "mousemove", "mousemove"),
	bind(Source::Scene, Selector::ViewService, "click", "viewService"),
	bind(Source::Scene, Selector::DestroyService, "click", "destroyService"),
	bind(Source::Direct, Selector::Service, "mousedown.addrel", "longClickStart"),
	bind(Source::Direct, Selector::Service, "mouseup.addrel", "longClickCancel"),
	bind(Source::Direct, Selector::Service, "dragstart", "dragstart"),
	bind(Source::Direct, Selector::Service, "drag", "drag"),
	bind(Source::Direct, Selector::Service, "dragend", "dragend"),
	bind(Source::Direct, Selector::ZoomPlane, "dragstart.pan", "panStart"),
	bind(Source::Direct, Selector::ZoomPlane, "drag.pan", "pan"),
	bind(Source::Direct, Selector::ZoomPlane, "dragend.pan", "panEnd"),
	bind(Source::App, Selector::Window, "wheel", "wheelZoom"),
	bind(Source::App, Selector::Window, "resize", "resized"),
	bind(Source::App, Selector::Window, "rendered", "renderedHandler"),
	bind(Source::App, Selector::Window, "zoom_in", "zoomIn"),
	bind(Source::App, Selector::Window, "zoom_out", "zoomOut"),
	bind(Source::App, Selector::Window, "toggleControlPanel", "closeControlPanel"),
	bind(Source::App, Selector::Window, "rescaled", "updateServiceMenuLocation"),
	bind(Source::App, Selector::Window, "pointermove", "mousemove"),
	bind(Source::App, Selector::Window, "pointerup", "addRelationDragEnd"),
];

pub fn registry() -> HashMap<&'static str, Handler> {
	let handlers: [(&'static str, Handler); 26] = [
		("serviceClick", service_click),
		("serviceDblClick", service_dbl_click),
		("serviceMouseEnter", service_mouse_enter),
		("serviceMouseLeave", service_mouse_leave),
		("showUnitCount", show_unit_count),
		("hideUnitCount", hide_unit_count),
		("mousemove", mousemove),
		("backgroundClick", background_click),
		("viewService", view_service),
		("destroyService", destroy_service),
		("longClickStart", long_click_start),
		("longClickCancel", long_click_cancel),
		("dragstart", drag_start),
		("drag", drag),
		("dragend", drag_end),
		("panStart", pan_start),
		("pan", pan),
		("panEnd", pan_end),
		("wheelZoom", wheel_zoom),
		("resized", resized),
		("renderedHandler", rendered),
		("zoomIn", zoom_in),
		("zoomOut", zoom_out),
		("closeControlPanel", close_control_panel),
		("updateServiceMenuLocation", update_service_menu_location),
		("addRelationDragEnd", add_relation_drag_end),
	];
	HashMap::from(handlers)
}

/// The router for the canvas' own table.
pub fn router() -> Result<EventRouter> {
	EventRouter::new(BINDINGS, &registry())
}

fn service_click(topo: &mut Topology, ev: &PointerEvent) {
	if topo.state.ignore_service_click {
		topo.state.ignore_service_click = false;
		return;
	}
	let Some(id) = ev.target.service_id() else {
		return;
	};
	let inside = topo
		.boxes()
		.get(id)
		.is_some_and(|b| b.contains_point(ev.screen, &topo.transform()));
	if inside {
		topo.toggle_control_panel(Some(id));
	}
}

fn service_dbl_click(topo: &mut Topology, ev: &PointerEvent) {
	if let Some(id) = ev.target.service_id() {
		topo.fire(TopologyEvent::ShowService {
			service: id.to_string(),
		});
	}
}

fn service_mouse_enter(topo: &mut Topology, ev: &PointerEvent) {
	let Some(id) = ev.target.service_id() else {
		return;
	};
	let inside = topo
		.boxes()
		.get(id)
		.is_some_and(|b| b.contains_point(ev.screen, &topo.transform()));
	if !inside {
		return;
	}
	topo.set_hovered(Some(id));
	topo.fire(TopologyEvent::SnapToService {
		service: id.to_string(),
	});
}

fn service_mouse_leave(topo: &mut Topology, ev: &PointerEvent) {
	let Some(id) = ev.target.service_id() else {
		return;
	};
	let inside = topo
		.boxes()
		.get(id)
		.is_some_and(|b| b.contains_point(ev.screen, &topo.transform()));
	if inside {
		return;
	}
	topo.set_hovered(None);
	topo.fire(TopologyEvent::SnapOutOfService);
}

fn show_unit_count(topo: &mut Topology, ev: &PointerEvent) {
	if let Some(id) = ev.target.service_id() {
		topo.set_unit_count_visible(id, true);
	}
}

fn hide_unit_count(topo: &mut Topology, ev: &PointerEvent) {
	if let Some(id) = ev.target.service_id() {
		topo.set_unit_count_visible(id, false);
	}
}

/// Follow the pointer with the dragline while a relation is being built.
fn mousemove(topo: &mut Topology, ev: &PointerEvent) {
	if topo.is_building_relation() {
		topo.move_dragline(ev.screen);
	}
}

fn background_click(topo: &mut Topology, _ev: &PointerEvent) {
	topo.toggle_control_panel(None);
	topo.fire(TopologyEvent::ClearState);
}

fn view_service(topo: &mut Topology, ev: &PointerEvent) {
	let Some(id) = ev.target.service_id().map(str::to_string) else {
		return;
	};
	topo.toggle_control_panel(None);
	topo.fire(TopologyEvent::ShowService { service: id });
}

fn destroy_service(topo: &mut Topology, ev: &PointerEvent) {
	let Some(id) = ev.target.service_id().map(str::to_string) else {
		return;
	};
	topo.toggle_control_panel(None);
	topo.fire(TopologyEvent::ChangeState(StateChange::DestroyConfirm { service: id }));
}

fn long_click_start(topo: &mut Topology, ev: &PointerEvent) {
	if let Some(id) = ev.target.service_id() {
		topo.long_click_start(id, ev.time_ms);
	}
}

fn long_click_cancel(topo: &mut Topology, _ev: &PointerEvent) {
	topo.long_click_cancel();
}

fn drag_start(topo: &mut Topology, ev: &PointerEvent) {
	if let Some(id) = ev.target.service_id() {
		topo.drag_start(id, ev.screen);
	}
}

fn drag(topo: &mut Topology, ev: &PointerEvent) {
	topo.drag_move(ev.screen);
}

fn drag_end(topo: &mut Topology, _ev: &PointerEvent) {
	if let Err(e) = topo.drag_end() {
		warn!("topology: {e}");
	}
}

fn pan_start(topo: &mut Topology, ev: &PointerEvent) {
	topo.pan_start(ev.screen);
}

fn pan(topo: &mut Topology, ev: &PointerEvent) {
	topo.pan_move(ev.screen);
}

fn pan_end(topo: &mut Topology, _ev: &PointerEvent) {
	topo.pan_end();
}

fn wheel_zoom(topo: &mut Topology, ev: &PointerEvent) {
	topo.wheel_zoom(ev.screen, ev.wheel_delta);
}

fn resized(topo: &mut Topology, _ev: &PointerEvent) {
	topo.resized();
}

fn rendered(topo: &mut Topology, _ev: &PointerEvent) {
	topo.update();
}

fn zoom_in(topo: &mut Topology, _ev: &PointerEvent) {
	topo.zoom_in();
}

fn zoom_out(topo: &mut Topology, _ev: &PointerEvent) {
	topo.zoom_out();
}

fn close_control_panel(topo: &mut Topology, _ev: &PointerEvent) {
	topo.toggle_control_panel(None);
}

fn update_service_menu_location(topo: &mut Topology, _ev: &PointerEvent) {
	topo.update_service_menu_location();
}

fn add_relation_drag_end(topo: &mut Topology, ev: &PointerEvent) {
	let target = match &ev.target {
		Target::Service(id) | Target::ServiceStatus(id) => Some(id.as_str()),
		_ => None,
	};
	topo.add_relation_drag_end(target);
}
