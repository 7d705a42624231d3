//! Topology configuration.
//!
//! Every field has a default, so a page may supply a partial JSON object in a
//! `<script id="topology-config" type="application/json">` element and leave
//! the rest alone.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsCast;
use web_sys::HtmlScriptElement;

use super::error::{Error, Result};

const CONFIG_ELEMENT_ID: &str = "topology-config";

/// What a zoom request outside `[min_zoom, max_zoom]` does to the stored scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomBoundsPolicy {
	/// Keep the last valid scale.
	#[default]
	Revert,
	/// Snap to the violated boundary.
	Clamp,
}

/// Parameters fed to the force simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
	pub charge: f32,
	pub link_strength: f32,
	pub max_force: f32,
	pub node_speed: f32,
	/// Velocity damping applied every step.
	pub friction: f32,
	pub node_mass: f32,
	/// Radius of the ring new boxes are spread on, around the viewport center.
	pub spawn_radius: f64,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			charge: 150.0,
			link_strength: 0.05,
			max_force: 100.0,
			node_speed: 3000.0,
			friction: 0.9,
			node_mass: 10.0,
			spawn_radius: 300.0,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
	pub min_zoom: f64,
	pub max_zoom: f64,
	/// Scale change applied by the zoom buttons.
	pub zoom_step: f64,
	pub zoom_bounds: ZoomBoundsPolicy,
	pub min_width: f64,
	pub min_height: f64,
	/// Canvas size used before the first resize.
	pub initial_size: [f64; 2],
	/// Gap kept between a newly placed box and the existing ones.
	pub service_padding: f64,
	/// How long a press must last before it starts a relation drag.
	pub long_click_ms: f64,
	/// Average pointer travel (px) that still counts as a press rather than a drag.
	pub long_click_tolerance: f64,
	/// Attach relation lines to box edges instead of box centers.
	pub snap_to_poles: bool,
	pub layout: LayoutConfig,
}

impl Default for TopologyConfig {
	fn default() -> Self {
		Self {
			min_zoom: 0.25,
			max_zoom: 2.0,
			zoom_step: 0.2,
			zoom_bounds: ZoomBoundsPolicy::default(),
			min_width: 800.0,
			min_height: 200.0,
			initial_size: [640.0, 480.0],
			service_padding: 300.0,
			long_click_ms: 750.0,
			long_click_tolerance: 5.0,
			snap_to_poles: false,
			layout: LayoutConfig::default(),
		}
	}
}

impl TopologyConfig {
	pub fn from_json(text: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Reject values the zoom and viewport code cannot work with.
	pub fn validate(&self) -> Result<()> {
		let positive = [
			("min_zoom", self.min_zoom),
			("max_zoom", self.max_zoom),
			("zoom_step", self.zoom_step),
			("min_width", self.min_width),
			("min_height", self.min_height),
		];
		for (field, value) in positive {
			if !(value.is_finite() && value > 0.0) {
				return Err(Error::ConfigValue {
					field,
					reason: "must be a positive number",
				});
			}
		}
		if self.min_zoom > self.max_zoom {
			return Err(Error::ConfigValue {
				field: "min_zoom",
				reason: "must not exceed max_zoom",
			});
		}
		Ok(())
	}

	/// Read the configuration embedded in the page, falling back to defaults.
	pub fn load_from_document() -> Self {
		let Some(text) = config_element_text() else {
			return Self::default();
		};
		match Self::from_json(&text) {
			Ok(config) => {
				info!("topology: loaded configuration from #{CONFIG_ELEMENT_ID}");
				config
			}
			Err(e) => {
				warn!("topology: {e}; using defaults");
				Self::default()
			}
		}
	}
}

fn config_element_text() -> Option<String> {
	let document = web_sys::window()?.document()?;
	let element = document.get_element_by_id(CONFIG_ELEMENT_ID)?;
	let script: HtmlScriptElement = element.dyn_into().ok()?;
	script.text().ok()
}
