//! Pan and zoom of the root drawing group.
//!
//! All zoom paths (buttons, wheel, programmatic pans) go through
//! [`PanZoom::rescale`], so the bounds policy is applied in exactly one place.

use log::debug;

use super::config::{TopologyConfig, ZoomBoundsPolicy};

/// Translate + uniform scale applied to everything drawn in graph space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

impl ViewTransform {
	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		((sx - self.x) / self.k, (sy - self.y) / self.k)
	}

	pub fn graph_to_screen(&self, gx: f64, gy: f64) -> (f64, f64) {
		(gx * self.k + self.x, gy * self.k + self.y)
	}
}

/// A requested scale/translate pair, as produced by a zoom gesture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomRequest {
	pub scale: f64,
	pub translate: (f64, f64),
}

/// Screen-space diameter of a service circle at scale 1, used to keep a
/// panned-to service fully on screen.
const CIRCLE_SIZE: f64 = 200.0;
/// Gap left between a panned-to service and the screen edge.
const EDGE_SPACE: f64 = 40.0;

pub struct PanZoom {
	transform: ViewTransform,
	min_zoom: f64,
	max_zoom: f64,
	step: f64,
	policy: ZoomBoundsPolicy,
}

impl PanZoom {
	pub fn new(config: &TopologyConfig) -> Self {
		Self {
			transform: ViewTransform::default(),
			min_zoom: config.min_zoom,
			max_zoom: config.max_zoom,
			step: config.zoom_step,
			policy: config.zoom_bounds,
		}
	}

	pub fn transform(&self) -> ViewTransform {
		self.transform
	}

	pub fn scale(&self) -> f64 {
		self.transform.k
	}

	pub fn translate(&self) -> (f64, f64) {
		(self.transform.x, self.transform.y)
	}

	pub fn zoom_in(&mut self, size: (f64, f64)) -> bool {
		self.zoom_by(self.step, size)
	}

	pub fn zoom_out(&mut self, size: (f64, f64)) -> bool {
		self.zoom_by(-self.step, size)
	}

	/// Change the scale by `delta`, shifting the translate so the zoom appears
	/// to originate from the middle of a canvas of `size`.
	pub fn zoom_by(&mut self, delta: f64, size: (f64, f64)) -> bool {
		let (tx, ty) = self.translate();
		self.rescale(ZoomRequest {
			scale: self.transform.k + delta,
			translate: (tx - size.0 / 2.0 * delta, ty - size.1 / 2.0 * delta),
		})
	}

	/// The request a wheel notch at `pointer` makes: scale by 1.1 (or 0.9
	/// when scrolling down) keeping the point under the pointer fixed.
	pub fn wheel_request(&self, pointer: (f64, f64), delta_y: f64) -> ZoomRequest {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let (px, py) = pointer;
		ZoomRequest {
			scale: self.transform.k * factor,
			translate: (
				px - (px - self.transform.x) * factor,
				py - (py - self.transform.y) * factor,
			),
		}
	}

	pub fn wheel_zoom(&mut self, pointer: (f64, f64), delta_y: f64) -> bool {
		self.rescale(self.wheel_request(pointer, delta_y))
	}

	/// Apply a zoom request. Bounds are compared as whole percentages so a
	/// value a hair past a boundary does not flicker in and out. Returns
	/// whether the stored transform changed.
	pub fn rescale(&mut self, request: ZoomRequest) -> bool {
		let percent = (request.scale * 100.0).floor();
		let in_bounds = request.scale.is_finite()
			&& percent >= (self.min_zoom * 100.0).floor()
			&& percent <= (self.max_zoom * 100.0).floor();

		let scale = if in_bounds {
			request.scale.clamp(self.min_zoom, self.max_zoom)
		} else {
			match self.policy {
				ZoomBoundsPolicy::Revert => {
					debug!(
						"topology: zoom to {} out of bounds, keeping {}",
						request.scale, self.transform.k
					);
					return false;
				}
				ZoomBoundsPolicy::Clamp if request.scale.is_finite() => {
					request.scale.clamp(self.min_zoom, self.max_zoom)
				}
				ZoomBoundsPolicy::Clamp => self.transform.k,
			}
		};

		let (tx, ty) = request.translate;
		let translate = if tx.is_finite() && ty.is_finite() {
			(tx, ty)
		} else {
			self.translate()
		};

		let next = ViewTransform {
			x: translate.0,
			y: translate.1,
			k: scale,
		};
		let changed = next != self.transform;
		self.transform = next;
		changed
	}

	/// Pan so `point` (graph space) is visible. With `center` the point is put
	/// in the middle of the screen; otherwise the view only moves if the
	/// service circle at `point` would cross a screen edge.
	pub fn pan_to_point(&mut self, point: (f64, f64), center: bool, screen: (f64, f64)) -> bool {
		let k = self.transform.k;
		let (tx, ty) = self.translate();
		let (mut nx, mut ny) = (tx, ty);
		if center {
			nx = -point.0 * k + screen.0 / 2.0;
			ny = -point.1 * k + screen.1 / 2.0;
		} else {
			let (px, py) = self.transform.graph_to_screen(point.0, point.1);
			let circle = CIRCLE_SIZE * k;
			if px < 0.0 {
				nx = tx - px + EDGE_SPACE;
			} else if px > screen.0 - circle {
				nx = tx + (screen.0 - (px + circle)) - EDGE_SPACE;
			}
			if py < 0.0 {
				ny = ty - py + EDGE_SPACE;
			} else if py > screen.1 - circle {
				ny = ty + (screen.1 - (py + circle)) - EDGE_SPACE;
			}
		}
		if nx == tx && ny == ty {
			return false;
		}
		self.rescale(ZoomRequest {
			scale: k,
			translate: (nx, ny),
		})
	}

	/// Move the view by a screen-space offset.
	pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
		let (tx, ty) = self.translate();
		self.rescale(ZoomRequest {
			scale: self.transform.k,
			translate: (tx + dx, ty + dy),
		})
	}
}
