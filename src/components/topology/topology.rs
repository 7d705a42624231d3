//! Shared state of one topology canvas: the visible boxes, view transform,
//! layout and the interaction state handlers work on.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, info};
use serde_json::json;

use super::annotations::{GUI_X, GUI_Y, update_landscape};
use super::config::TopologyConfig;
use super::environment::{EntityKind, Environment, RemoteError};
use super::error::{Error, Result};
use super::events::{EventBus, TopologyEvent};
use super::interaction::MenuAction;
use super::layout::{EdgeVisual, ForceLayout};
use super::model::{Annotations, Database, Lifecycle, Service};
use super::notifications::{Notifications, Severity};
use super::panzoom::{PanZoom, ViewTransform};
use super::requests::PendingRequests;
use super::router::Target;
use super::service_box::{
	DragPhase, ServiceBox, boxes_to_vertices, centroid, distance, point_outside, sync_boxes,
};
use super::viewport::{Dimensions, Viewport, ViewportHost};

/// Width of the service menu.
pub const MENU_WIDTH: f64 = 160.0;
/// Distance from the top of the menu to the tip of its arrow.
const MENU_ARROW_OFFSET: f64 = 68.0;
const MENU_ITEM_HEIGHT: f64 = 32.0;
/// Half size of the hit area around a relation label.
const LABEL_HIT: (f64, f64) = (40.0, 12.0);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
	pub x: f64,
	pub y: f64,
	pub w: f64,
	pub h: f64,
}

impl Rect {
	pub fn contains(&self, (px, py): (f64, f64)) -> bool {
		px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
	}
}

/// The control panel shown next to the active service, in screen space.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceMenu {
	pub service: String,
	pub top: f64,
	pub left: f64,
	/// Menu sits right of the service, arrow pointing left.
	pub on_right: bool,
}

/// An in-progress "add relation" gesture.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationBuild {
	pub source: String,
	/// Dragline end, graph space.
	pub pointer: (f64, f64),
}

#[derive(Clone, Debug)]
struct LongClick {
	service: String,
	started_at: f64,
	/// Box position when the press started.
	origin: (f64, f64),
}

#[derive(Clone, Debug)]
struct BoxDrag {
	service: String,
	last: (f64, f64),
}

/// Pointer driven state the handlers mutate.
#[derive(Debug, Default)]
pub struct InteractionState {
	pub menu: Option<ServiceMenu>,
	pub hovered: Option<String>,
	pub relation: Option<RelationBuild>,
	/// Set by a drag so the click that ends it is not taken as a service click.
	pub ignore_service_click: bool,
	long_click: Option<LongClick>,
	drag: Option<BoxDrag>,
	pan: Option<(f64, f64)>,
}

pub struct Topology {
	config: TopologyConfig,
	db: Rc<RefCell<Database>>,
	env: Rc<dyn Environment>,
	boxes: IndexMap<String, ServiceBox>,
	panzoom: PanZoom,
	viewport: Viewport,
	size: Dimensions,
	layout: ForceLayout,
	bus: EventBus,
	requests: PendingRequests,
	notifications: Notifications,
	host: Option<Box<dyn ViewportHost>>,
	pub(crate) state: InteractionState,
	torn_down: bool,
}

impl Topology {
	pub fn new(config: TopologyConfig, db: Rc<RefCell<Database>>, env: Rc<dyn Environment>) -> Self {
		let [width, height] = config.initial_size;
		Self {
			panzoom: PanZoom::new(&config),
			viewport: Viewport::new(&config),
			layout: ForceLayout::new(&config.layout),
			size: Dimensions { width, height },
			config,
			db,
			env,
			boxes: IndexMap::new(),
			bus: EventBus::default(),
			requests: PendingRequests::default(),
			notifications: Notifications::default(),
			host: None,
			state: InteractionState::default(),
			torn_down: false,
		}
	}

	/// Report into a list the application also reads.
	pub fn with_notifications(mut self, notifications: Notifications) -> Self {
		self.notifications = notifications;
		self
	}

	pub fn set_host(&mut self, host: Box<dyn ViewportHost>) {
		self.host = Some(host);
	}

	pub fn config(&self) -> &TopologyConfig {
		&self.config
	}

	pub fn db(&self) -> &Rc<RefCell<Database>> {
		&self.db
	}

	pub fn boxes(&self) -> &IndexMap<String, ServiceBox> {
		&self.boxes
	}

	pub fn transform(&self) -> ViewTransform {
		self.panzoom.transform()
	}

	pub fn size(&self) -> Dimensions {
		self.size
	}

	pub fn notifications(&self) -> &Notifications {
		&self.notifications
	}

	pub fn requests_in_flight(&self) -> usize {
		self.requests.len()
	}

	pub fn is_anchored(&self, id: &str) -> bool {
		self.layout.is_anchored(id)
	}

	pub fn is_torn_down(&self) -> bool {
		self.torn_down
	}

	pub fn active_service(&self) -> Option<&str> {
		self.state.menu.as_ref().map(|m| m.service.as_str())
	}

	fn screen(&self) -> (f64, f64) {
		(self.size.width, self.size.height)
	}

	/// Bring boxes and layout in line with the database.
	pub fn update(&mut self) {
		if self.torn_down {
			return;
		}
		update_landscape(&mut self.db.borrow_mut());
		let db = self.db.borrow();
		sync_boxes(&db, &mut self.boxes);

		let mut moved = Vec::new();
		for (id, b) in self.boxes.iter_mut() {
			let Some(annotated) = db.service(id).and_then(Service::annotated_position) else {
				continue;
			};
			let phase = b.drag;
			match phase {
				DragPhase::Ending if b.is_at(annotated) => b.drag = DragPhase::Idle,
				// Moved from another session.
				DragPhase::Idle if !b.is_at(annotated) => {
					b.set_position(annotated.0, annotated.1);
					moved.push(id.clone());
				}
				_ => {}
			}
		}

		let placed: Vec<&ServiceBox> = self.boxes.values().filter(|b| b.position.is_some()).collect();
		let around = if placed.is_empty() {
			let (w, h) = self.screen();
			self.panzoom.transform().screen_to_graph(w / 2.0, h / 2.0)
		} else {
			point_outside(&boxes_to_vertices(placed), self.config.service_padding)
		};
		let join = self.layout.bind(&mut self.boxes, db.visible_relations(), around);
		drop(db);

		for id in &moved {
			let center = self.boxes[id.as_str()].center();
			self.layout.release(id, center);
		}
		if moved.len() > 1 {
			self.bus.fire(TopologyEvent::PanToCenter);
		}
		if let Some(menu) = &self.state.menu
			&& !self.boxes.contains_key(&menu.service)
		{
			self.state.menu = None;
		}
		if !join.entered.is_empty() || !join.exited.is_empty() {
			debug!(
				"topology: {} services entered, {} exited",
				join.entered.len(),
				join.exited.len()
			);
		}
	}

	pub fn tick(&mut self, dt: f32) {
		if self.torn_down {
			return;
		}
		self.layout.tick(dt, &mut self.boxes);
		if self.state.menu.is_some() {
			self.update_service_menu_location();
		}
	}

	pub fn fire(&mut self, event: TopologyEvent) {
		self.bus.fire(event);
	}

	/// Drain the event queue. View events are handled here; every event is
	/// returned, in firing order, for the host application.
	pub fn process(&mut self) -> Vec<TopologyEvent> {
		let mut out = Vec::new();
		while let Some(event) = self.bus.next() {
			match &event {
				TopologyEvent::Zoom(request) => {
					if self.panzoom.rescale(*request) {
						self.bus.fire(TopologyEvent::Rescaled);
					}
				}
				TopologyEvent::PanToCenter => {
					if let Some(point) = centroid(&boxes_to_vertices(self.boxes.values())) {
						self.bus.fire(TopologyEvent::PanToPoint { point, center: true });
					}
				}
				TopologyEvent::PanToPoint { point, center } => {
					let screen = self.screen();
					if self.panzoom.pan_to_point(*point, *center, screen) {
						self.bus.fire(TopologyEvent::Rescaled);
					}
				}
				TopologyEvent::AddRelationDragStart { service } => {
					if let Some(b) = self.boxes.get(service) {
						self.state.relation = Some(RelationBuild {
							source: service.clone(),
							pointer: b.center(),
						});
					}
				}
				TopologyEvent::AddRelation { .. }
				| TopologyEvent::CancelRelationBuild
				| TopologyEvent::ClearState => self.state.relation = None,
				_ => {}
			}
			out.push(event);
		}
		out
	}

	pub fn zoom_in(&mut self) {
		let screen = self.screen();
		if self.panzoom.zoom_in(screen) {
			self.bus.fire(TopologyEvent::Rescaled);
		}
		self.bus.fire(TopologyEvent::PanToCenter);
	}

	pub fn zoom_out(&mut self) {
		let screen = self.screen();
		if self.panzoom.zoom_out(screen) {
			self.bus.fire(TopologyEvent::Rescaled);
		}
		self.bus.fire(TopologyEvent::PanToCenter);
	}

	pub fn wheel_zoom(&mut self, pointer: (f64, f64), delta_y: f64) {
		let request = self.panzoom.wheel_request(pointer, delta_y);
		self.bus.fire(TopologyEvent::Zoom(request));
	}

	pub fn pan_start(&mut self, screen: (f64, f64)) {
		if self.state.relation.is_none() {
			self.state.pan = Some(screen);
		}
	}

	pub fn pan_move(&mut self, screen: (f64, f64)) {
		let Some(last) = self.state.pan else {
			return;
		};
		self.state.pan = Some(screen);
		if self.panzoom.pan_by(screen.0 - last.0, screen.1 - last.1) {
			self.bus.fire(TopologyEvent::Rescaled);
		}
	}

	pub fn pan_end(&mut self) {
		self.state.pan = None;
	}

	pub fn is_panning(&self) -> bool {
		self.state.pan.is_some()
	}

	pub fn resized(&mut self) -> Option<Dimensions> {
		let Some(host) = self.host.as_deref_mut() else {
			debug!("topology: no viewport host attached, skipping resize");
			return None;
		};
		self.viewport.resized(host, &mut self.size, &mut self.bus)
	}

	/// Open the control panel for `service`, or close it when it is already
	/// open or `service` is `None`.
	pub fn toggle_control_panel(&mut self, service: Option<&str>) {
		match service {
			Some(id) if self.state.menu.is_none() && self.boxes.contains_key(id) => {
				self.state.menu = Some(ServiceMenu {
					service: id.to_string(),
					top: 0.0,
					left: 0.0,
					on_right: true,
				});
				self.update_service_menu_location();
			}
			_ => self.state.menu = None,
		}
	}

	/// Keep the menu pointing at its service after a pan, zoom or move. The
	/// menu opens on the side of the service facing the middle of the screen.
	pub fn update_service_menu_location(&mut self) {
		let Some(menu) = self.state.menu.as_mut() else {
			return;
		};
		let Some(b) = self.boxes.get(&menu.service) else {
			return;
		};
		let t = self.panzoom.transform();
		let (x, y) = b.xy();
		let (_, cy) = b.relative_center();
		menu.on_right = x * t.k + t.x + b.w * t.k / 2.0 < self.size.width / 2.0;
		menu.top = y * t.k + t.y + cy * t.k - MENU_ARROW_OFFSET;
		menu.left = x * t.k + t.x + if menu.on_right { b.w * t.k } else { -MENU_WIDTH };
	}

	/// Screen rectangles of the open menu's items.
	pub fn menu_items(&self) -> Vec<(MenuAction, Rect)> {
		let Some(menu) = &self.state.menu else {
			return Vec::new();
		};
		MenuAction::ALL
			.iter()
			.enumerate()
			.map(|(i, action)| {
				(
					*action,
					Rect {
						x: menu.left,
						y: menu.top + MENU_ARROW_OFFSET - MENU_ITEM_HEIGHT + i as f64 * MENU_ITEM_HEIGHT,
						w: MENU_WIDTH,
						h: MENU_ITEM_HEIGHT,
					},
				)
			})
			.collect()
	}

	pub fn edges(&self) -> Vec<EdgeVisual> {
		let db = self.db.borrow();
		self.layout
			.edge_visuals(&self.boxes, db.visible_relations(), self.config.snap_to_poles)
	}

	/// Dragline of a relation being built, graph space.
	pub fn dragline(&self) -> Option<((f64, f64), (f64, f64))> {
		let build = self.state.relation.as_ref()?;
		let source = self.boxes.get(&build.source)?;
		let start = source.nearest_connector(build.pointer, self.config.snap_to_poles);
		Some((start, build.pointer))
	}

	/// What lies under a screen point, topmost first.
	pub fn hit_test(&self, screen: (f64, f64)) -> Target {
		if let Some(menu) = &self.state.menu {
			for (action, rect) in self.menu_items() {
				if rect.contains(screen) {
					return Target::MenuItem(action, menu.service.clone());
				}
			}
		}
		let t = self.panzoom.transform();
		for b in self.boxes.values().rev() {
			if !b.contains_point(screen, &t) {
				continue;
			}
			let (gx, gy) = t.screen_to_graph(screen.0, screen.1);
			let (x, y) = b.xy();
			let (rx, ry) = b.relative_center();
			if distance((gx, gy), (x + rx, y + ry)) <= b.w / 6.0 {
				return Target::ServiceStatus(b.id.clone());
			}
			return Target::Service(b.id.clone());
		}
		let (gx, gy) = t.screen_to_graph(screen.0, screen.1);
		for edge in self.edges() {
			let (mx, my) = edge.midpoint();
			if (gx - mx).abs() <= LABEL_HIT.0 && (gy - my).abs() <= LABEL_HIT.1 {
				return Target::RelationLabel(edge.id);
			}
		}
		Target::Background
	}

	pub fn set_hovered(&mut self, service: Option<&str>) {
		for b in self.boxes.values_mut() {
			b.hovered = service == Some(b.id.as_str());
		}
		self.state.hovered = service.map(str::to_string);
	}

	pub fn set_unit_count_visible(&mut self, service: &str, visible: bool) {
		if let Some(b) = self.boxes.get_mut(service) {
			b.show_unit_count = visible;
		}
	}

	pub fn move_dragline(&mut self, screen: (f64, f64)) {
		let t = self.panzoom.transform();
		if let Some(build) = self.state.relation.as_mut() {
			build.pointer = t.screen_to_graph(screen.0, screen.1);
		}
	}

	pub fn is_building_relation(&self) -> bool {
		self.state.relation.is_some()
	}

	/// Start timing a press on `service` that may become a relation drag.
	pub fn long_click_start(&mut self, service: &str, now_ms: f64) {
		let Some(b) = self.boxes.get(service) else {
			return;
		};
		self.state.long_click = Some(LongClick {
			service: service.to_string(),
			started_at: now_ms,
			origin: b.xy(),
		});
	}

	pub fn long_click_cancel(&mut self) {
		self.state.long_click = None;
	}

	/// Fire `AddRelationDragStart` once a press has lasted long enough without
	/// the box wandering off.
	pub fn poll_long_click(&mut self, now_ms: f64) {
		let Some(press) = &self.state.long_click else {
			return;
		};
		if now_ms - press.started_at < self.config.long_click_ms {
			return;
		}
		let Some(press) = self.state.long_click.take() else {
			return;
		};
		let Some(b) = self.boxes.get(&press.service) else {
			return;
		};
		let (x, y) = b.xy();
		let travel = ((x - press.origin.0).abs() + (y - press.origin.1).abs()) / 2.0;
		if travel > self.config.long_click_tolerance {
			debug!("topology: long click on {} moved {travel}px, ignoring", press.service);
			return;
		}
		self.bus.fire(TopologyEvent::AddRelationDragStart {
			service: press.service,
		});
	}

	pub fn drag_start(&mut self, service: &str, screen: (f64, f64)) {
		let Some(b) = self.boxes.get_mut(service) else {
			return;
		};
		b.drag = DragPhase::Start;
		self.state.drag = Some(BoxDrag {
			service: service.to_string(),
			last: screen,
		});
		self.state.menu = None;
	}

	/// The service a drag is in progress on.
	pub fn dragging(&self) -> Option<&str> {
		self.state.drag.as_ref().map(|d| d.service.as_str())
	}

	pub fn drag_move(&mut self, screen: (f64, f64)) {
		if self.state.relation.is_some() {
			self.move_dragline(screen);
			return;
		}
		let Some(drag) = self.state.drag.as_mut() else {
			return;
		};
		let k = self.panzoom.scale();
		let (dx, dy) = ((screen.0 - drag.last.0) / k, (screen.1 - drag.last.1) / k);
		drag.last = screen;
		let id = drag.service.clone();
		let Some(b) = self.boxes.get_mut(&id) else {
			return;
		};
		b.translate_by(dx, dy);
		if b.drag == DragPhase::Start {
			b.drag = DragPhase::Active;
		}
		let center = b.center();
		self.layout.pin(&id, center);
		self.state.menu = None;
		self.bus.fire(TopologyEvent::CancelRelationBuild);
		self.bus.fire(TopologyEvent::ServiceMoved { service: id });
	}

	pub fn drag_end(&mut self) -> Result<()> {
		let Some(drag) = self.state.drag.take() else {
			return Ok(());
		};
		if self.state.relation.is_some() {
			self.state.ignore_service_click = true;
			return Ok(());
		}
		let Some(b) = self.boxes.get_mut(&drag.service) else {
			return Ok(());
		};
		if b.drag != DragPhase::Active {
			b.drag = DragPhase::Idle;
			return Ok(());
		}
		self.state.ignore_service_click = true;
		let center = b.center();
		self.layout.release(&drag.service, center);
		self.annotate_box_position(&drag.service)
	}

	/// Finish a relation drag over `target`.
	pub fn add_relation_drag_end(&mut self, target: Option<&str>) {
		let Some(build) = self.state.relation.take() else {
			return;
		};
		match target {
			Some(target) if target != build.source && self.boxes.contains_key(target) => {
				self.bus.fire(TopologyEvent::AddRelation {
					source: build.source,
					target: target.to_string(),
				});
			}
			_ => self.bus.fire(TopologyEvent::CancelRelationBuild),
		}
	}

	/// Persist a box's position as `gui-x`/`gui-y`. Ghosts only keep it
	/// locally; committed services also send it to the environment.
	pub fn annotate_box_position(&mut self, id: &str) -> Result<()> {
		let b = self
			.boxes
			.get_mut(id)
			.ok_or_else(|| Error::UnknownService(id.to_string()))?;
		let (x, y) = b.xy();
		let data = Annotations::from([(GUI_X.to_string(), json!(x)), (GUI_Y.to_string(), json!(y))]);
		self.db
			.borrow_mut()
			.service_mut(id)
			.ok_or_else(|| Error::UnknownService(id.to_string()))?
			.annotations
			.extend(data.clone());
		if b.is_pending() {
			b.drag = DragPhase::Idle;
			return Ok(());
		}
		b.drag = DragPhase::Ending;

		let notifications = self.notifications.clone();
		let service = id.to_string();
		let callback = self.requests.guard(move |result: std::result::Result<(), RemoteError>| {
			if let Err(e) = result {
				notifications.add(
					"Error saving service position",
					format!("{service}: {e}"),
					Severity::Error,
				);
			}
		});
		let handle = self
			.env
			.update_annotations(id, EntityKind::Application, data, Box::new(callback));
		self.requests.track(handle);
		Ok(())
	}

	/// Add a ghost service, placed at a screen point.
	pub fn add_ghost(&mut self, mut service: Service, screen: (f64, f64)) {
		let (gx, gy) = self.panzoom.transform().screen_to_graph(screen.0, screen.1);
		service.lifecycle = Lifecycle::Pending;
		service.annotations.insert(GUI_X.to_string(), json!(gx));
		service.annotations.insert(GUI_Y.to_string(), json!(gy));
		info!("topology: placing ghost {}", service.id);
		self.db.borrow_mut().add_service(service);
		self.update();
	}

	/// The environment confirmed a ghost.
	pub fn commit_service(&mut self, id: &str) -> Result<()> {
		self.db.borrow_mut().transition_service(id, Lifecycle::Committed)?;
		if let Some(b) = self.boxes.get_mut(id) {
			b.lifecycle = Lifecycle::Committed;
		}
		self.annotate_box_position(id)
	}

	/// The environment refused a ghost: drop it and tell the user why.
	pub fn rollback_service(&mut self, id: &str, reason: &str) -> Result<()> {
		self.db.borrow_mut().transition_service(id, Lifecycle::Destroyed)?;
		self.boxes.shift_remove(id);
		if self.active_service() == Some(id) {
			self.state.menu = None;
		}
		self.notifications
			.add(format!("Error deploying {id}"), reason, Severity::Error);
		self.update();
		Ok(())
	}

	/// Abort outstanding requests and drop view state. Idempotent.
	pub fn teardown(&mut self) {
		if self.torn_down {
			return;
		}
		info!("topology: tearing down, aborting {} requests", self.requests.len());
		self.requests.abort_all();
		self.boxes.clear();
		self.bus.drain();
		self.state = InteractionState::default();
		self.host = None;
		self.torn_down = true;
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use std::cell::Cell;

	use super::*;
	use crate::components::topology::environment::{AnnotationCallback, SimulatedEnvironment};
	use crate::components::topology::model::{Endpoint, Relation, Unit};
	use crate::components::topology::requests::RequestHandle;
	use crate::components::topology::viewport::tests::{RecordingHost, full_page};

	/// Counts calls and keeps callbacks so tests decide when they run.
	#[derive(Default)]
	pub(crate) struct CountingEnvironment {
		pub calls: Cell<u32>,
		pub aborted: Rc<Cell<u32>>,
		pub callbacks: RefCell<Vec<AnnotationCallback>>,
	}

	struct Handle(Rc<Cell<u32>>);

	impl RequestHandle for Handle {
		fn abort(&mut self) {
			self.0.set(self.0.get() + 1);
		}
	}

	impl Environment for CountingEnvironment {
		fn update_annotations(
			&self,
			_id: &str,
			_kind: EntityKind,
			_data: Annotations,
			callback: AnnotationCallback,
		) -> Box<dyn RequestHandle> {
			self.calls.set(self.calls.get() + 1);
			self.callbacks.borrow_mut().push(callback);
			Box::new(Handle(self.aborted.clone()))
		}
	}

	pub(crate) fn sample_db() -> Database {
		let mut db = Database::default();
		for (id, lifecycle) in [
			("wordpress", Lifecycle::Committed),
			("mysql", Lifecycle::Committed),
			("ghost", Lifecycle::Pending),
		] {
			db.add_service(Service {
				id: id.into(),
				name: id.into(),
				charm: format!("cs:precise/{id}"),
				lifecycle,
				units: vec![Unit {
					id: format!("{id}/0"),
					status: "started".into(),
					..Default::default()
				}],
				..Default::default()
			});
		}
		db.add_relation(Relation {
			id: "wordpress:db mysql:db".into(),
			endpoints: [
				Endpoint {
					service: "wordpress".into(),
					interface: "db".into(),
				},
				Endpoint {
					service: "mysql".into(),
					interface: "db".into(),
				},
			],
			lifecycle: Lifecycle::Committed,
		});
		db
	}

	fn topology() -> (Topology, Rc<CountingEnvironment>) {
		let env = Rc::new(CountingEnvironment::default());
		let mut topo = Topology::new(
			TopologyConfig::default(),
			Rc::new(RefCell::new(sample_db())),
			env.clone(),
		);
		topo.update();
		(topo, env)
	}

	#[test]
	fn pending_boxes_never_reach_the_environment() {
		let (mut topo, env) = topology();
		topo.annotate_box_position("ghost").unwrap();
		topo.annotate_box_position("ghost").unwrap();
		assert_eq!(env.calls.get(), 0);
		let db = topo.db().borrow();
		let ghost = db.service("ghost").unwrap();
		assert_eq!(ghost.annotated_position(), topo.boxes()["ghost"].position);
	}

	#[test]
	fn committed_boxes_write_once_per_annotation() {
		let (mut topo, env) = topology();
		topo.annotate_box_position("mysql").unwrap();
		assert_eq!(env.calls.get(), 1);
		assert_eq!(topo.boxes()["mysql"].drag, DragPhase::Ending);
		topo.annotate_box_position("mysql").unwrap();
		assert_eq!(env.calls.get(), 2);
		assert_eq!(topo.requests_in_flight(), 2);
	}

	#[test]
	fn unknown_service_cannot_be_annotated() {
		let (mut topo, _) = topology();
		assert!(matches!(
			topo.annotate_box_position("nope"),
			Err(Error::UnknownService(_))
		));
	}

	#[test]
	fn failed_write_notifies() {
		let db = Rc::new(RefCell::new(sample_db()));
		let env = Rc::new(SimulatedEnvironment::new(db.clone()));
		env.fail_writes_for("mysql");
		let mut topo = Topology::new(TopologyConfig::default(), db, env.clone());
		topo.update();
		topo.annotate_box_position("mysql").unwrap();
		topo.annotate_box_position("wordpress").unwrap();
		assert_eq!(env.flush(), 2);
		let notes = topo.notifications().all();
		assert_eq!(notes.len(), 1);
		assert_eq!(notes[0].severity, Severity::Error);
		assert!(notes[0].message.starts_with("mysql"));
	}

	#[test]
	fn teardown_aborts_once_and_silences_callbacks() {
		let (mut topo, env) = topology();
		topo.annotate_box_position("mysql").unwrap();
		topo.annotate_box_position("wordpress").unwrap();
		topo.teardown();
		topo.teardown();
		assert_eq!(env.aborted.get(), 2);

		for callback in env.callbacks.borrow_mut().drain(..) {
			callback(Err(RemoteError("late".into())));
		}
		assert!(topo.notifications().is_empty());
		assert!(topo.boxes().is_empty());
	}

	#[test]
	fn ghost_commit_and_rollback() {
		let (mut topo, env) = topology();
		topo.commit_service("ghost").unwrap();
		assert!(!topo.boxes()["ghost"].is_pending());
		assert_eq!(env.calls.get(), 1);
		assert!(matches!(
			topo.commit_service("ghost"),
			Err(Error::InvalidTransition { .. })
		));

		topo.add_ghost(
			Service {
				id: "haproxy".into(),
				name: "haproxy".into(),
				..Default::default()
			},
			(100.0, 100.0),
		);
		assert!(topo.boxes()["haproxy"].is_pending());
		assert_eq!(topo.boxes()["haproxy"].position, Some((100.0, 100.0)));
		assert!(topo.is_anchored("haproxy"));

		topo.rollback_service("haproxy", "charm not found").unwrap();
		assert!(!topo.boxes().contains_key("haproxy"));
		assert!(topo.db().borrow().service("haproxy").is_none());
		assert_eq!(topo.notifications().len(), 1);
	}

	#[test]
	fn resize_recenters_through_the_event_queue() {
		let (mut topo, _) = topology();
		assert_eq!(topo.resized(), None);
		topo.set_host(Box::new(RecordingHost {
			metrics: Some(full_page(1000.0, 600.0)),
			..Default::default()
		}));
		topo.resized().unwrap();
		let events = topo.process();
		assert_eq!(events.first(), Some(&TopologyEvent::BeforePageSizeRecalculation));
		assert!(events.contains(&TopologyEvent::PanToCenter));
		assert!(events.iter().any(|e| matches!(e, TopologyEvent::PanToPoint { center: true, .. })));

		// Everything is now centered on the screen.
		let vertices = boxes_to_vertices(topo.boxes().values());
		let (cx, cy) = centroid(&vertices).unwrap();
		let (sx, sy) = topo.transform().graph_to_screen(cx, cy);
		assert!((sx - 500.0).abs() < 1e-6 && (sy - 300.0).abs() < 1e-6);
	}

	#[test]
	fn zoom_buttons_rescale_and_recenter() {
		let (mut topo, _) = topology();
		topo.zoom_in();
		let events = topo.process();
		assert!((topo.transform().k - 1.2).abs() < 1e-9);
		assert_eq!(events[0], TopologyEvent::Rescaled);
		assert_eq!(events[1], TopologyEvent::PanToCenter);
	}

	#[test]
	fn wheel_zoom_goes_through_a_zoom_event() {
		let (mut topo, _) = topology();
		topo.wheel_zoom((10.0, 10.0), -120.0);
		let events = topo.process();
		assert!(matches!(events[0], TopologyEvent::Zoom(_)));
		assert_eq!(events[1], TopologyEvent::Rescaled);
		assert!((topo.transform().k - 1.1).abs() < 1e-9);
	}

	#[test]
	fn dragging_a_box_persists_its_position() {
		let (mut topo, env) = topology();
		let before = topo.boxes()["wordpress"].xy();
		topo.drag_start("wordpress", (0.0, 0.0));
		topo.drag_move((10.0, 20.0));
		topo.drag_move((30.0, 40.0));
		topo.tick(0.016);
		topo.drag_end().unwrap();
		let after = topo.boxes()["wordpress"].xy();
		assert_eq!((after.0 - before.0, after.1 - before.1), (30.0, 40.0));
		assert!(topo.state.ignore_service_click);
		assert!(topo.is_anchored("wordpress"));
		assert_eq!(env.calls.get(), 1);
		let events = topo.process();
		assert!(events.contains(&TopologyEvent::ServiceMoved {
			service: "wordpress".into()
		}));

		// The local annotation now matches, so the next update settles the drag.
		topo.update();
		assert_eq!(topo.boxes()["wordpress"].drag, DragPhase::Idle);
	}

	#[test]
	fn restored_positions_settle_without_recentering() {
		let mut db = sample_db();
		for (id, (x, y)) in [("wordpress", (10.1, 20.3)), ("mysql", (500.7, 40.9))] {
			let service = db.service_mut(id).unwrap();
			service.annotations.insert(GUI_X.into(), json!(x));
			service.annotations.insert(GUI_Y.into(), json!(y));
		}
		let env = Rc::new(CountingEnvironment::default());
		let mut topo = Topology::new(TopologyConfig::default(), Rc::new(RefCell::new(db)), env);
		topo.update();
		topo.process();

		topo.pan_start((0.0, 0.0));
		topo.pan_move((123.0, 45.0));
		topo.pan_end();
		topo.process();
		let panned = topo.transform();

		for _ in 0..3 {
			topo.tick(0.016);
			topo.update();
			assert!(!topo.process().contains(&TopologyEvent::PanToCenter));
		}
		assert_eq!(topo.transform(), panned);
		assert_eq!(topo.boxes()["wordpress"].position, Some((10.1, 20.3)));
		assert_eq!(topo.boxes()["mysql"].drag, DragPhase::Idle);
	}

	#[test]
	fn a_press_without_movement_does_not_annotate() {
		let (mut topo, env) = topology();
		topo.drag_start("mysql", (5.0, 5.0));
		topo.drag_end().unwrap();
		assert_eq!(env.calls.get(), 0);
		assert_eq!(topo.boxes()["mysql"].drag, DragPhase::Idle);
	}

	#[test]
	fn long_click_starts_a_relation_build() {
		let (mut topo, _) = topology();
		topo.long_click_start("wordpress", 1000.0);
		topo.poll_long_click(1500.0);
		assert!(topo.process().is_empty());
		topo.poll_long_click(1750.0);
		let events = topo.process();
		assert_eq!(
			events,
			[TopologyEvent::AddRelationDragStart {
				service: "wordpress".into()
			}]
		);
		assert!(topo.is_building_relation());
		assert!(topo.dragline().is_some());

		topo.add_relation_drag_end(Some("mysql"));
		let events = topo.process();
		assert_eq!(
			events,
			[TopologyEvent::AddRelation {
				source: "wordpress".into(),
				target: "mysql".into()
			}]
		);
		assert!(!topo.is_building_relation());
	}

	#[test]
	fn long_click_with_movement_is_ignored() {
		let (mut topo, _) = topology();
		topo.long_click_start("wordpress", 0.0);
		topo.drag_start("wordpress", (0.0, 0.0));
		topo.drag_move((40.0, 40.0));
		topo.poll_long_click(800.0);
		assert!(!topo.process().iter().any(|e| matches!(e, TopologyEvent::AddRelationDragStart { .. })));
	}

	#[test]
	fn hit_test_finds_services_status_and_menu() {
		let (mut topo, _) = topology();
		let b = topo.boxes()["mysql"].clone();
		let t = topo.transform();
		let (cx, cy) = b.center();
		let (sx, sy) = t.graph_to_screen(cx, cy);
		assert_eq!(topo.hit_test((sx, sy)), Target::ServiceStatus("mysql".into()));
		let (ex, ey) = t.graph_to_screen(b.xy().0 + b.w / 2.0, b.xy().1 + 10.0);
		assert_eq!(topo.hit_test((ex, ey)), Target::Service("mysql".into()));
		assert_eq!(topo.hit_test((-5000.0, -5000.0)), Target::Background);

		topo.toggle_control_panel(Some("mysql"));
		assert_eq!(topo.active_service(), Some("mysql"));
		let (action, rect) = topo.menu_items()[1];
		assert_eq!(
			topo.hit_test((rect.x + 1.0, rect.y + 1.0)),
			Target::MenuItem(action, "mysql".into())
		);
		topo.toggle_control_panel(Some("mysql"));
		assert_eq!(topo.active_service(), None);
	}
}
