//! Keeps the canvas sized to the space the page leaves for it.

use log::debug;

use super::config::TopologyConfig;
use super::events::{EventBus, TopologyEvent};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Dimensions {
	pub width: f64,
	pub height: f64,
}

/// Page measurements the effective canvas size is derived from. Missing
/// chrome is `None`/`false`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PageMetrics {
	/// Height available to the document.
	pub container_height: Option<f64>,
	pub has_header: bool,
	pub bottom_navbar_height: Option<f64>,
	/// Computed width of the viewport element; `None` when absent or `auto`.
	pub viewport_width: Option<f64>,
}

/// Where the computed size ends up.
pub trait ViewportHost {
	/// `None` when the canvas or its drawing surface is not in the page.
	fn page_metrics(&self) -> Option<PageMetrics>;
	/// Style size of the element wrapping the canvas.
	fn set_wrapper_size(&mut self, dimensions: Dimensions);
	/// Pixel size of the drawing surface.
	fn set_surface_size(&mut self, dimensions: Dimensions);
	/// Size of the plane capturing pan and zoom gestures.
	fn set_zoom_plane_size(&mut self, dimensions: Dimensions);
}

pub fn effective_viewport_size(metrics: &PageMetrics, min_width: f64, min_height: f64) -> Dimensions {
	let fallback = Dimensions {
		width: min_width,
		height: min_height,
	};
	let (Some(container_height), Some(viewport_width)) =
		(metrics.container_height, metrics.viewport_width)
	else {
		return fallback;
	};
	if container_height <= 0.0 || !metrics.has_header {
		return fallback;
	}
	let height = container_height - metrics.bottom_navbar_height.unwrap_or(0.0);
	Dimensions {
		width: viewport_width.floor().max(min_width),
		height: height.max(min_height),
	}
}

pub struct Viewport {
	min_width: f64,
	min_height: f64,
}

impl Viewport {
	pub fn new(config: &TopologyConfig) -> Self {
		Self {
			min_width: config.min_width,
			min_height: config.min_height,
		}
	}

	/// Recompute the canvas size. Listeners get a chance to settle page
	/// layout between the before/after notifications.
	pub fn resized(
		&self,
		host: &mut dyn ViewportHost,
		size: &mut Dimensions,
		bus: &mut EventBus,
	) -> Option<Dimensions> {
		let Some(metrics) = host.page_metrics() else {
			debug!("topology: canvas not in the page, skipping resize");
			return None;
		};
		bus.fire(TopologyEvent::BeforePageSizeRecalculation);
		let dimensions = effective_viewport_size(&metrics, self.min_width, self.min_height);
		self.set_all_the_dimensions(dimensions, host, size, bus);
		bus.fire(TopologyEvent::AfterPageSizeRecalculation);
		Some(dimensions)
	}

	/// Push `dimensions` everywhere; only a real size change re-centers.
	pub fn set_all_the_dimensions(
		&self,
		dimensions: Dimensions,
		host: &mut dyn ViewportHost,
		size: &mut Dimensions,
		bus: &mut EventBus,
	) {
		host.set_wrapper_size(dimensions);
		host.set_surface_size(dimensions);
		host.set_zoom_plane_size(dimensions);
		if *size != dimensions {
			*size = dimensions;
			bus.fire(TopologyEvent::PanToCenter);
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	#[derive(Default)]
	pub(crate) struct RecordingHost {
		pub metrics: Option<PageMetrics>,
		pub applied: Vec<(&'static str, Dimensions)>,
	}

	impl ViewportHost for RecordingHost {
		fn page_metrics(&self) -> Option<PageMetrics> {
			self.metrics
		}
		fn set_wrapper_size(&mut self, d: Dimensions) {
			self.applied.push(("wrapper", d));
		}
		fn set_surface_size(&mut self, d: Dimensions) {
			self.applied.push(("surface", d));
		}
		fn set_zoom_plane_size(&mut self, d: Dimensions) {
			self.applied.push(("zoom-plane", d));
		}
	}

	pub(crate) fn full_page(width: f64, height: f64) -> PageMetrics {
		PageMetrics {
			container_height: Some(height + 30.0),
			has_header: true,
			bottom_navbar_height: Some(30.0),
			viewport_width: Some(width + 0.7),
		}
	}

	#[test]
	fn missing_canvas_is_a_silent_no_op() {
		let viewport = Viewport::new(&TopologyConfig::default());
		let mut host = RecordingHost::default();
		let mut size = Dimensions::default();
		let mut bus = EventBus::default();
		assert_eq!(viewport.resized(&mut host, &mut size, &mut bus), None);
		assert!(host.applied.is_empty());
		assert!(bus.is_empty());
	}

	#[test]
	fn resize_notifies_around_the_recalculation() {
		let viewport = Viewport::new(&TopologyConfig::default());
		let mut host = RecordingHost {
			metrics: Some(full_page(1200.0, 700.0)),
			..Default::default()
		};
		let mut size = Dimensions::default();
		let mut bus = EventBus::default();
		let d = viewport.resized(&mut host, &mut size, &mut bus).unwrap();
		assert_eq!(
			d,
			Dimensions {
				width: 1200.0,
				height: 700.0
			}
		);
		assert_eq!(size, d);
		assert_eq!(
			bus.drain(),
			vec![
				TopologyEvent::BeforePageSizeRecalculation,
				TopologyEvent::PanToCenter,
				TopologyEvent::AfterPageSizeRecalculation,
			]
		);
		let targets: Vec<_> = host.applied.iter().map(|(t, _)| *t).collect();
		assert_eq!(targets, ["wrapper", "surface", "zoom-plane"]);
	}

	#[test]
	fn unchanged_size_reapplies_without_recentering() {
		let viewport = Viewport::new(&TopologyConfig::default());
		let mut host = RecordingHost {
			metrics: Some(full_page(1000.0, 500.0)),
			..Default::default()
		};
		let mut size = Dimensions::default();
		let mut bus = EventBus::default();
		viewport.resized(&mut host, &mut size, &mut bus);
		bus.drain();
		viewport.resized(&mut host, &mut size, &mut bus);
		assert_eq!(host.applied.len(), 6);
		assert!(!bus.drain().contains(&TopologyEvent::PanToCenter));
	}

	#[test]
	fn effective_size_respects_minimums() {
		let small = full_page(300.0, 100.0);
		assert_eq!(
			effective_viewport_size(&small, 800.0, 200.0),
			Dimensions {
				width: 800.0,
				height: 200.0
			}
		);
		let no_header = PageMetrics {
			has_header: false,
			..full_page(1500.0, 900.0)
		};
		assert_eq!(
			effective_viewport_size(&no_header, 800.0, 200.0),
			Dimensions {
				width: 800.0,
				height: 200.0
			}
		);
	}
}
