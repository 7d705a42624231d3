//! In-memory model of the environment the canvas draws: services, their units,
//! relations and environment level annotations.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{Error, Result};

pub type Annotations = BTreeMap<String, Value>;

/// Where an entity stands with respect to the remote environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
	/// Created locally, not yet confirmed by the environment (a ghost).
	Pending,
	#[default]
	Committed,
	Destroyed,
}

impl Lifecycle {
	pub fn can_become(self, next: Lifecycle) -> bool {
		matches!(
			(self, next),
			(Lifecycle::Pending, Lifecycle::Committed)
				| (Lifecycle::Pending, Lifecycle::Destroyed)
				| (Lifecycle::Committed, Lifecycle::Destroyed)
		)
	}

	pub fn is_destroyed(self) -> bool {
		self == Lifecycle::Destroyed
	}
}

/// The two per-machine flags Landscape reports through annotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LandscapeFlag {
	SecurityUpgrades,
	NeedsReboot,
}

impl LandscapeFlag {
	pub const ALL: [LandscapeFlag; 2] = [LandscapeFlag::SecurityUpgrades, LandscapeFlag::NeedsReboot];

	pub fn annotation_key(self) -> &'static str {
		match self {
			LandscapeFlag::SecurityUpgrades => "landscape-security-upgrades",
			LandscapeFlag::NeedsReboot => "landscape-needs-reboot",
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LandscapeFlags {
	pub security_upgrades: bool,
	pub needs_reboot: bool,
}

impl LandscapeFlags {
	pub fn get(&self, flag: LandscapeFlag) -> bool {
		match flag {
			LandscapeFlag::SecurityUpgrades => self.security_upgrades,
			LandscapeFlag::NeedsReboot => self.needs_reboot,
		}
	}

	pub fn set(&mut self, flag: LandscapeFlag, value: bool) {
		match flag {
			LandscapeFlag::SecurityUpgrades => self.security_upgrades = value,
			LandscapeFlag::NeedsReboot => self.needs_reboot = value,
		}
	}
}

/// Truthiness of an annotation value, the way the annotation store reports flags.
pub fn annotation_is_set(annotations: &Annotations, key: &str) -> bool {
	match annotations.get(key) {
		None | Some(Value::Null) => false,
		Some(Value::Bool(b)) => *b,
		Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
		Some(Value::String(s)) => !s.is_empty(),
		Some(Value::Array(_)) | Some(Value::Object(_)) => true,
	}
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Unit {
	pub id: String,
	/// Agent state category, e.g. `started`, `pending`, `error`.
	pub status: String,
	pub annotations: Annotations,
	pub lifecycle: Lifecycle,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
	pub id: String,
	pub name: String,
	pub charm: String,
	pub subordinate: bool,
	pub units: Vec<Unit>,
	pub annotations: Annotations,
	pub lifecycle: Lifecycle,
	#[serde(skip)]
	pub landscape: LandscapeFlags,
}

impl Service {
	pub fn live_units(&self) -> impl Iterator<Item = &Unit> {
		self.units.iter().filter(|u| !u.lifecycle.is_destroyed())
	}

	/// Unit counts per status category, destroyed units excluded.
	pub fn status_counts(&self) -> BTreeMap<String, u64> {
		let mut counts = BTreeMap::new();
		for unit in self.live_units() {
			*counts.entry(unit.status.clone()).or_insert(0) += 1;
		}
		counts
	}

	/// Position persisted in `gui-x`/`gui-y`, if both are present and numeric.
	pub fn annotated_position(&self) -> Option<(f64, f64)> {
		let coord = |key: &str| {
			let value = match self.annotations.get(key)? {
				Value::Number(n) => n.as_f64(),
				Value::String(s) => s.trim().parse::<f64>().ok(),
				_ => None,
			};
			value.filter(|v| v.is_finite())
		};
		Some((coord("gui-x")?, coord("gui-y")?))
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
	pub service: String,
	pub interface: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Relation {
	pub id: String,
	pub endpoints: [Endpoint; 2],
	pub lifecycle: Lifecycle,
}

impl Relation {
	pub fn connects(&self, service_id: &str) -> bool {
		self.endpoints.iter().any(|ep| ep.service == service_id)
	}
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentModel {
	pub name: String,
	pub annotations: Annotations,
	#[serde(skip)]
	pub landscape: LandscapeFlags,
}

/// The service/unit/relation store the topology reads from.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
	pub environment: EnvironmentModel,
	pub services: IndexMap<String, Service>,
	pub relations: Vec<Relation>,
}

impl Database {
	pub fn add_service(&mut self, service: Service) {
		self.services.insert(service.id.clone(), service);
	}

	pub fn service(&self, id: &str) -> Option<&Service> {
		self.services.get(id)
	}

	pub fn service_mut(&mut self, id: &str) -> Option<&mut Service> {
		self.services.get_mut(id)
	}

	/// Services the canvas should show.
	pub fn visible_services(&self) -> impl Iterator<Item = &Service> {
		self.services.values().filter(|s| !s.lifecycle.is_destroyed())
	}

	pub fn add_relation(&mut self, relation: Relation) {
		self.relations.push(relation);
	}

	pub fn visible_relations(&self) -> impl Iterator<Item = &Relation> {
		self.relations.iter().filter(|r| {
			!r.lifecycle.is_destroyed()
				&& r.endpoints.iter().all(|ep| {
					self.service(&ep.service)
						.is_some_and(|s| !s.lifecycle.is_destroyed())
				})
		})
	}

	/// Move a service along its lifecycle. Destroying a service removes it and
	/// every relation touching it.
	pub fn transition_service(&mut self, id: &str, next: Lifecycle) -> Result<()> {
		let service = self
			.services
			.get_mut(id)
			.ok_or_else(|| Error::UnknownService(id.to_string()))?;
		if !service.lifecycle.can_become(next) {
			return Err(Error::InvalidTransition {
				id: id.to_string(),
				from: service.lifecycle,
				to: next,
			});
		}
		service.lifecycle = next;
		if next.is_destroyed() {
			self.services.shift_remove(id);
			self.relations.retain(|r| !r.connects(id));
		}
		Ok(())
	}
}
