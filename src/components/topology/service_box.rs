use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::debug;

use super::model::{Database, Lifecycle, Service};
use super::panzoom::ViewTransform;

pub const SERVICE_SIZE: f64 = 190.0;
pub const SUBORDINATE_SIZE: f64 = 130.0;

/// Positions closer than this, in graph units, are the same position. The
/// layout simulation works in `f32`, so round trips through it drift.
pub const POSITION_TOLERANCE: f64 = 0.01;

/// Fractions of the box size taken up by its halo, per side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Margins {
	pub top: f64,
	pub bottom: f64,
	pub left: f64,
	pub right: f64,
}

pub const SERVICE_MARGINS: Margins = Margins {
	top: 0.01,
	bottom: 0.01,
	left: 0.01,
	right: 0.01,
};

pub const SUBORDINATE_MARGINS: Margins = Margins {
	top: 0.05,
	bottom: 0.1,
	left: 0.084848,
	right: 0.084848,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragPhase {
	#[default]
	Idle,
	Start,
	Active,
	/// Dropped; position is on its way to the environment.
	Ending,
}

/// Position and appearance of one service on the canvas.
#[derive(Clone, Debug)]
pub struct ServiceBox {
	pub id: String,
	pub name: String,
	pub charm: String,
	pub subordinate: bool,
	pub lifecycle: Lifecycle,
	/// Top-left corner in graph space; `None` until placed.
	pub position: Option<(f64, f64)>,
	pub w: f64,
	pub h: f64,
	pub status: BTreeMap<String, u64>,
	pub drag: DragPhase,
	pub show_unit_count: bool,
	pub hovered: bool,
}

impl ServiceBox {
	pub fn from_service(service: &Service) -> Self {
		let size = if service.subordinate {
			SUBORDINATE_SIZE
		} else {
			SERVICE_SIZE
		};
		let mut service_box = Self {
			id: service.id.clone(),
			name: service.name.clone(),
			charm: service.charm.clone(),
			subordinate: service.subordinate,
			lifecycle: service.lifecycle,
			position: None,
			w: size,
			h: size,
			status: BTreeMap::new(),
			drag: DragPhase::Idle,
			show_unit_count: false,
			hovered: false,
		};
		service_box.refresh(service);
		service_box
	}

	/// Pull model attributes into the box, keeping its position.
	pub fn refresh(&mut self, service: &Service) {
		self.name = service.name.clone();
		self.charm = service.charm.clone();
		self.lifecycle = service.lifecycle;
		self.status = service.status_counts();
		if self.position.is_none() {
			self.position = service.annotated_position();
		}
	}

	pub fn is_pending(&self) -> bool {
		self.lifecycle == Lifecycle::Pending
	}

	pub fn xy(&self) -> (f64, f64) {
		self.position.unwrap_or((0.0, 0.0))
	}

	pub fn set_position(&mut self, x: f64, y: f64) {
		self.position = Some((x, y));
	}

	/// Whether the box sits at `point`, up to [`POSITION_TOLERANCE`].
	pub fn is_at(&self, point: (f64, f64)) -> bool {
		self.position.is_some_and(|(x, y)| {
			(x - point.0).abs() < POSITION_TOLERANCE && (y - point.1).abs() < POSITION_TOLERANCE
		})
	}

	pub fn translate_by(&mut self, dx: f64, dy: f64) {
		let (x, y) = self.xy();
		self.set_position(x + dx, y + dy);
	}

	pub fn margins(&self) -> Margins {
		if self.subordinate {
			SUBORDINATE_MARGINS
		} else {
			SERVICE_MARGINS
		}
	}

	/// Center relative to the box's top-left corner, corrected for the halo.
	pub fn relative_center(&self) -> (f64, f64) {
		let m = self.margins();
		(
			self.w / 2.0 + (m.left * self.w / 2.0 - m.right * self.w / 2.0),
			self.h / 2.0 - (m.bottom * self.h / 2.0 - m.top * self.h / 2.0),
		)
	}

	pub fn center(&self) -> (f64, f64) {
		let (rx, ry) = self.relative_center();
		let (x, y) = self.xy();
		(x + rx, y + ry)
	}

	/// Whether a screen-space point falls inside the service circle.
	pub fn contains_point(&self, point: (f64, f64), transform: &ViewTransform) -> bool {
		let (gx, gy) = transform.screen_to_graph(point.0, point.1);
		let (x, y) = self.xy();
		let r = self.w / 2.0;
		(gx - (x + r)).powi(2) + (gy - (y + r)).powi(2) <= r * r
	}

	/// Points relations may attach to.
	pub fn connectors(&self, snap_to_poles: bool) -> Vec<(f64, f64)> {
		let (x, y, w, h) = (self.xy().0, self.xy().1, self.w, self.h);
		if !snap_to_poles {
			return vec![(x + w / 2.0, y + h / 2.0)];
		}
		let m = self.margins();
		let mid_y = y + h / 2.0 - (m.bottom * h / 2.0 - m.top * h / 2.0);
		vec![
			(x + w / 2.0, y + m.top * h),
			(x + w - m.right * w, mid_y),
			(x + w / 2.0, y + h - m.bottom * h),
			(x + m.left * w, mid_y),
		]
	}

	pub fn nearest_connector(&self, point: (f64, f64), snap_to_poles: bool) -> (f64, f64) {
		self.connectors(snap_to_poles)
			.into_iter()
			.min_by(|a, b| distance(*a, point).total_cmp(&distance(*b, point)))
			.unwrap_or_else(|| self.center())
	}

	/// The closest pair of connectors between two boxes, `self` first.
	pub fn connector_pair(&self, other: &ServiceBox, snap_to_poles: bool) -> ((f64, f64), (f64, f64)) {
		let ours = self.connectors(snap_to_poles);
		let theirs = other.connectors(snap_to_poles);
		let mut best = (self.center(), other.center());
		let mut shortest = f64::INFINITY;
		for &a in &ours {
			for &b in &theirs {
				let d = distance(a, b);
				if d < shortest {
					shortest = d;
					best = (a, b);
				}
			}
		}
		best
	}
}

pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
	((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Bring the box map in line with the visible services: drop boxes whose
/// service is gone, refresh the rest, and create boxes for new services.
pub fn sync_boxes(db: &Database, boxes: &mut IndexMap<String, ServiceBox>) {
	boxes.retain(|id, _| {
		let keep = db
			.service(id)
			.is_some_and(|s| !s.lifecycle.is_destroyed());
		if !keep {
			debug!("topology: dropping box for {id}");
		}
		keep
	});
	for service in db.visible_services() {
		match boxes.get_mut(&service.id) {
			Some(existing) => existing.refresh(service),
			None => {
				boxes.insert(service.id.clone(), ServiceBox::from_service(service));
			}
		}
	}
}

/// Corners of every placed box.
pub fn boxes_to_vertices<'a>(boxes: impl IntoIterator<Item = &'a ServiceBox>) -> Vec<(f64, f64)> {
	boxes
		.into_iter()
		.filter_map(|b| b.position.map(|(x, y)| (b, x, y)))
		.flat_map(|(b, x, y)| [(x, y), (x + b.w, y), (x, y + b.h), (x + b.w, y + b.h)])
		.collect()
}

pub fn centroid(vertices: &[(f64, f64)]) -> Option<(f64, f64)> {
	if vertices.is_empty() {
		return None;
	}
	let n = vertices.len() as f64;
	let (sx, sy) = vertices
		.iter()
		.fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
	Some((sx / n, sy / n))
}

/// A point just right of everything in `vertices`, vertically centered on them.
pub fn point_outside(vertices: &[(f64, f64)], padding: f64) -> (f64, f64) {
	let Some((_, cy)) = centroid(vertices) else {
		return (0.0, 0.0);
	};
	let max_x = vertices
		.iter()
		.map(|(x, _)| *x)
		.fold(f64::NEG_INFINITY, f64::max);
	(max_x + padding, cy)
}
