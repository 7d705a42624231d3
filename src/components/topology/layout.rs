//! Force-directed placement of service boxes, on top of `force_graph`.
//!
//! The simulation works on box centers in graph space. Box positions are the
//! source of truth between rebinds: every rebuild seeds the simulation from
//! them, and every tick writes the simulated centers back.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use indexmap::IndexMap;
use log::debug;

use super::config::LayoutConfig;
use super::model::{Lifecycle, Relation};
use super::service_box::ServiceBox;

/// Outcome of joining the box set against what the simulation holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Join {
	pub entered: Vec<String>,
	pub updated: Vec<String>,
	pub exited: Vec<String>,
}

/// Where to draw a relation line.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeVisual {
	pub id: String,
	pub source: String,
	pub target: String,
	pub x1: f64,
	pub y1: f64,
	pub x2: f64,
	pub y2: f64,
	/// Interface name shown on the relation label.
	pub label: String,
	pub pending: bool,
}

impl EdgeVisual {
	pub fn midpoint(&self) -> (f64, f64) {
		((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
	}
}

pub struct ForceLayout {
	graph: ForceGraph<String, ()>,
	index: HashMap<String, DefaultNodeIdx>,
	edges: Vec<(String, String)>,
	/// Boxes held in place: dropped after a drag or restored from annotations.
	anchored: HashSet<String>,
	params: LayoutConfig,
}

fn simulation(params: &LayoutConfig) -> ForceGraph<String, ()> {
	ForceGraph::new(SimulationParameters {
		force_charge: params.charge,
		force_spring: params.link_strength,
		force_max: params.max_force,
		node_speed: params.node_speed,
		damping_factor: params.friction,
	})
}

impl ForceLayout {
	pub fn new(params: &LayoutConfig) -> Self {
		Self {
			graph: simulation(params),
			index: HashMap::new(),
			edges: Vec::new(),
			anchored: HashSet::new(),
			params: params.clone(),
		}
	}

	pub fn len(&self) -> usize {
		self.index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.index.is_empty()
	}

	pub fn is_anchored(&self, id: &str) -> bool {
		self.anchored.contains(id)
	}

	/// Join `boxes` and `relations` into the simulation. New boxes without a
	/// position are spread on a ring around `around`; new boxes that already
	/// have one (restored from annotations) are anchored there.
	pub fn bind<'a>(
		&mut self,
		boxes: &mut IndexMap<String, ServiceBox>,
		relations: impl IntoIterator<Item = &'a Relation>,
		around: (f64, f64),
	) -> Join {
		let mut join = Join::default();
		for id in boxes.keys() {
			if self.index.contains_key(id) {
				join.updated.push(id.clone());
			} else {
				join.entered.push(id.clone());
			}
		}
		join.exited = self
			.index
			.keys()
			.filter(|id| !boxes.contains_key(*id))
			.cloned()
			.collect();
		for id in &join.exited {
			self.anchored.remove(id);
		}

		let mut unplaced = Vec::new();
		for id in &join.entered {
			if boxes[id.as_str()].position.is_some() {
				// Restored from annotations: keep it where the user left it.
				self.anchored.insert(id.clone());
			} else {
				unplaced.push(id);
			}
		}
		let count = unplaced.len();
		for (i, id) in unplaced.into_iter().enumerate() {
			let angle = i as f64 * 2.0 * PI / count as f64;
			let b = &mut boxes[id.as_str()];
			let (rx, ry) = b.relative_center();
			b.set_position(
				around.0 + self.params.spawn_radius * angle.cos() - rx,
				around.1 + self.params.spawn_radius * angle.sin() - ry,
			);
		}

		let mut edges: Vec<(String, String)> = relations
			.into_iter()
			.filter_map(|r| {
				let (a, b) = (&r.endpoints[0].service, &r.endpoints[1].service);
				if a == b {
					return None;
				}
				if !boxes.contains_key(a) || !boxes.contains_key(b) {
					debug!("topology: skipping relation {} with an endpoint off canvas", r.id);
					return None;
				}
				Some(if a < b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) })
			})
			.collect();
		edges.sort();
		edges.dedup();

		if !join.entered.is_empty() || !join.exited.is_empty() || edges != self.edges {
			self.edges = edges;
			self.rebuild(boxes);
		}
		join
	}

	fn rebuild(&mut self, boxes: &IndexMap<String, ServiceBox>) {
		let mut graph = simulation(&self.params);
		let mut index = HashMap::new();
		for (id, b) in boxes {
			let (cx, cy) = b.center();
			let idx = graph.add_node(NodeData {
				x: cx as f32,
				y: cy as f32,
				mass: self.params.node_mass,
				is_anchor: self.anchored.contains(id),
				user_data: id.clone(),
			});
			index.insert(id.clone(), idx);
		}
		for (a, b) in &self.edges {
			graph.add_edge(index[a], index[b], EdgeData::default());
		}
		debug!(
			"topology: simulation rebuilt with {} services, {} relations",
			index.len(),
			self.edges.len()
		);
		self.graph = graph;
		self.index = index;
	}

	/// Advance the simulation and write centers back onto the free boxes.
	/// Anchored boxes already hold their position.
	pub fn tick(&mut self, dt: f32, boxes: &mut IndexMap<String, ServiceBox>) {
		if self.index.is_empty() {
			return;
		}
		self.graph.update(dt);
		let anchored = &self.anchored;
		self.graph.visit_nodes(|node| {
			let id = &node.data.user_data;
			if anchored.contains(id) {
				return;
			}
			let Some(b) = boxes.get_mut(id) else {
				return;
			};
			let (rx, ry) = b.relative_center();
			let (x, y) = (node.x() as f64 - rx, node.y() as f64 - ry);
			if b.position != Some((x, y)) {
				b.set_position(x, y);
			}
		});
	}

	/// Hold a box's center at `center` while it is dragged.
	pub fn pin(&mut self, id: &str, center: (f64, f64)) {
		let Some(&idx) = self.index.get(id) else {
			return;
		};
		self.anchored.insert(id.to_string());
		self.graph.visit_nodes_mut(|node| {
			if node.index() == idx {
				node.data.x = center.0 as f32;
				node.data.y = center.1 as f32;
				node.data.is_anchor = true;
			}
		});
	}

	/// End of a drag: the box stays where it was dropped.
	pub fn release(&mut self, id: &str, center: (f64, f64)) {
		self.pin(id, center);
	}

	pub fn edge_visuals<'a>(
		&self,
		boxes: &IndexMap<String, ServiceBox>,
		relations: impl IntoIterator<Item = &'a Relation>,
		snap_to_poles: bool,
	) -> Vec<EdgeVisual> {
		relations
			.into_iter()
			.filter_map(|r| {
				let source = boxes.get(&r.endpoints[0].service)?;
				let target = boxes.get(&r.endpoints[1].service)?;
				let ((x1, y1), (x2, y2)) = source.connector_pair(target, snap_to_poles);
				Some(EdgeVisual {
					id: r.id.clone(),
					source: source.id.clone(),
					target: target.id.clone(),
					x1,
					y1,
					x2,
					y2,
					label: r.endpoints[0].interface.clone(),
					pending: r.lifecycle == Lifecycle::Pending,
				})
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::topology::model::{Endpoint, Service};

	fn boxes(ids: &[&str]) -> IndexMap<String, ServiceBox> {
		ids.iter()
			.map(|id| {
				let b = ServiceBox::from_service(&Service {
					id: id.to_string(),
					name: id.to_string(),
					..Default::default()
				});
				(id.to_string(), b)
			})
			.collect()
	}

	fn relation(a: &str, b: &str) -> Relation {
		Relation {
			id: format!("{a}:db {b}:db"),
			endpoints: [
				Endpoint {
					service: a.into(),
					interface: "db".into(),
				},
				Endpoint {
					service: b.into(),
					interface: "db".into(),
				},
			],
			..Default::default()
		}
	}

	#[test]
	fn bind_reports_enter_update_exit() {
		let mut layout = ForceLayout::new(&LayoutConfig::default());
		let mut set = boxes(&["a", "b"]);
		let join = layout.bind(&mut set, &[], (0.0, 0.0));
		assert_eq!(join.entered, ["a", "b"]);
		assert!(join.updated.is_empty());
		assert!(set.values().all(|b| b.position.is_some()));

		set.shift_remove("a");
		set.extend(boxes(&["c"]));
		let join = layout.bind(&mut set, &[], (0.0, 0.0));
		assert_eq!(join.entered, ["c"]);
		assert_eq!(join.updated, ["b"]);
		assert_eq!(join.exited, ["a"]);
		assert_eq!(layout.len(), 2);
	}

	#[test]
	fn new_boxes_are_spread_around_the_given_point() {
		let mut layout = ForceLayout::new(&LayoutConfig::default());
		let mut set = boxes(&["a", "b", "c", "d"]);
		layout.bind(&mut set, &[], (500.0, 400.0));
		for b in set.values() {
			let (cx, cy) = b.center();
			let r = ((cx - 500.0).powi(2) + (cy - 400.0).powi(2)).sqrt();
			assert!((r - 300.0).abs() < 1e-6);
		}
		assert!(set.keys().all(|id| !layout.is_anchored(id)));
	}

	#[test]
	fn annotated_boxes_are_anchored() {
		let mut layout = ForceLayout::new(&LayoutConfig::default());
		let mut set = boxes(&["a", "b"]);
		set["a"].position = Some((40.0, 60.0));
		layout.bind(&mut set, &[relation("a", "b")], (0.0, 0.0));
		assert!(layout.is_anchored("a"));
		assert!(!layout.is_anchored("b"));

		for _ in 0..30 {
			layout.tick(0.016, &mut set);
		}
		assert_eq!(set["a"].position, Some((40.0, 60.0)));
	}

	#[test]
	fn ticks_move_free_boxes() {
		let mut layout = ForceLayout::new(&LayoutConfig::default());
		let mut set = boxes(&["a", "b"]);
		layout.bind(&mut set, &[relation("a", "b")], (0.0, 0.0));
		let before = set["b"].position;
		for _ in 0..30 {
			layout.tick(0.016, &mut set);
		}
		assert_ne!(set["b"].position, before);
	}

	#[test]
	fn pinned_box_holds_its_center() {
		let mut layout = ForceLayout::new(&LayoutConfig::default());
		let mut set = boxes(&["a", "b"]);
		layout.bind(&mut set, &[relation("a", "b")], (0.0, 0.0));
		let (rx, ry) = set["b"].relative_center();
		set["b"].set_position(1000.0 - rx, 1000.0 - ry);
		layout.release("b", (1000.0, 1000.0));
		for _ in 0..10 {
			layout.tick(0.016, &mut set);
		}
		let (cx, cy) = set["b"].center();
		assert!((cx - 1000.0).abs() < 1e-9 && (cy - 1000.0).abs() < 1e-9);
		assert!(layout.is_anchored("b"));
	}

	#[test]
	fn edges_skip_missing_endpoints() {
		let mut layout = ForceLayout::new(&LayoutConfig::default());
		let mut set = boxes(&["a", "b"]);
		let relations = [relation("a", "b"), relation("a", "ghost")];
		layout.bind(&mut set, &relations, (0.0, 0.0));
		let edges = layout.edge_visuals(&set, &relations, false);
		assert_eq!(edges.len(), 1);
		assert_eq!((edges[0].x1, edges[0].y1), set["a"].connectors(false)[0]);
	}
}
