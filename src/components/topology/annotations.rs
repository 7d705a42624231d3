//! Landscape integration: flags rolled up from unit annotations, and the
//! links/badges shown for them.

use log::warn;
use serde_json::Value;

use super::model::{Annotations, Database, LandscapeFlag, LandscapeFlags, annotation_is_set};

pub const GUI_X: &str = "gui-x";
pub const GUI_Y: &str = "gui-y";

/// What a Landscape link should point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandscapeTarget<'a> {
	Environment,
	Service(&'a str),
	Unit { service: &'a str, unit: &'a str },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
	Reboot,
	Security,
}

impl Intent {
	fn flag(self) -> LandscapeFlag {
		match self {
			Intent::Reboot => LandscapeFlag::NeedsReboot,
			Intent::Security => LandscapeFlag::SecurityUpgrades,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Badge {
	pub link: Option<String>,
	pub sprite: String,
}

fn annotation_str(annotations: &Annotations, key: &str) -> Option<String> {
	match annotations.get(key)? {
		Value::String(s) if !s.is_empty() => Some(s.clone()),
		Value::String(_) | Value::Null => None,
		other => Some(other.to_string()),
	}
}

pub fn ensure_trailing_slash(mut text: String) -> String {
	if !text.ends_with('/') {
		text.push('/');
	}
	text
}

/// Roll unit level Landscape flags up to services and the environment.
///
/// Everything is recomputed on each call, so flags cleared on units clear at
/// the upper levels too. Call it once after a batch of model changes.
pub fn update_landscape(db: &mut Database) {
	let mut environment = LandscapeFlags::default();
	for flag in LandscapeFlag::ALL {
		let key = flag.annotation_key();
		let mut any_service = false;
		for service in db.services.values_mut() {
			let flagged = service
				.live_units()
				.any(|unit| annotation_is_set(&unit.annotations, key));
			service.landscape.set(flag, flagged);
			any_service |= flagged;
		}
		environment.set(flag, any_service);
	}
	db.environment.landscape = environment;
}

/// Landscape URL for the environment, a service or a unit, optionally
/// pointing at one of the alert pages.
pub fn landscape_url(db: &Database, target: LandscapeTarget<'_>, intent: Option<Intent>) -> Option<String> {
	let env = &db.environment.annotations;
	let mut url = annotation_str(env, "landscape-url")?;
	url.push_str(&annotation_str(env, "landscape-computers").unwrap_or_default());

	match target {
		LandscapeTarget::Environment => {}
		LandscapeTarget::Service(id) => {
			let Some(computers) = db
				.service(id)
				.and_then(|s| annotation_str(&s.annotations, "landscape-computers"))
			else {
				warn!("topology: service {id} is missing the landscape-computers annotation");
				return None;
			};
			url.push_str(&ensure_trailing_slash(computers));
		}
		LandscapeTarget::Unit { service, unit } => {
			let Some(computer) = db
				.service(service)
				.and_then(|s| s.units.iter().find(|u| u.id == unit))
				.and_then(|u| annotation_str(&u.annotations, "landscape-computer"))
			else {
				warn!("topology: unit {unit} is missing the landscape-computer annotation");
				return None;
			};
			url.push_str(&ensure_trailing_slash(computer));
		}
	}

	Some(match intent {
		None => ensure_trailing_slash(url),
		Some(Intent::Reboot) => {
			url + &annotation_str(env, "landscape-reboot-alert-url").unwrap_or_default()
		}
		Some(Intent::Security) => {
			url + &annotation_str(env, "landscape-security-alert-url").unwrap_or_default()
		}
	})
}

/// Badge for a model that has the flag behind `intent` set, else `None`.
pub fn landscape_badge(
	db: &Database,
	target: LandscapeTarget<'_>,
	intent: Intent,
	hint: Option<&str>,
) -> Option<Badge> {
	let flag = intent.flag();
	let flagged = match target {
		LandscapeTarget::Environment => db.environment.landscape.get(flag),
		LandscapeTarget::Service(id) => db.service(id)?.landscape.get(flag),
		LandscapeTarget::Unit { service, unit } => {
			let unit = db.service(service)?.units.iter().find(|u| u.id == unit)?;
			annotation_is_set(&unit.annotations, flag.annotation_key())
		}
	};
	if !flagged {
		return None;
	}
	let mut sprite = String::from(match intent {
		Intent::Reboot => "landscape_restart",
		Intent::Security => "landscape_security",
	});
	if let Some(hint) = hint {
		sprite.push('_');
		sprite.push_str(hint);
	}
	Some(Badge {
		link: landscape_url(db, target, Some(intent)),
		sprite,
	})
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::components::topology::model::{Lifecycle, Service, Unit};

	fn unit(id: &str, annotations: Annotations) -> Unit {
		Unit {
			id: id.into(),
			status: "started".into(),
			annotations,
			..Default::default()
		}
	}

	fn flagged(key: &str) -> Annotations {
		Annotations::from([(key.to_string(), json!(true))])
	}

	fn db() -> Database {
		let mut db = Database::default();
		db.environment.annotations = Annotations::from([
			("landscape-url".to_string(), json!("http://landscape.example.com")),
			("landscape-computers".to_string(), json!("/computers/criteria/environment:test")),
			("landscape-reboot-alert-url".to_string(), json!("+alert:computer-reboot/info#power")),
			("landscape-security-alert-url".to_string(), json!("+alert:security-upgrades/packages/list?filter=security")),
		]);
		db.add_service(Service {
			id: "mysql".into(),
			name: "mysql".into(),
			units: vec![
				unit("mysql/0", flagged("landscape-needs-reboot")),
				unit("mysql/1", Annotations::new()),
			],
			annotations: Annotations::from([(
				"landscape-computers".to_string(),
				json!("+service:mysql"),
			)]),
			..Default::default()
		});
		db.add_service(Service {
			id: "wordpress".into(),
			name: "wordpress".into(),
			units: vec![unit("wordpress/0", Annotations::new())],
			..Default::default()
		});
		db
	}

	#[test]
	fn roll_up_is_a_logical_or() {
		let mut db = db();
		update_landscape(&mut db);
		assert!(db.service("mysql").unwrap().landscape.needs_reboot);
		assert!(!db.service("wordpress").unwrap().landscape.needs_reboot);
		assert!(db.environment.landscape.needs_reboot);
		assert!(!db.environment.landscape.security_upgrades);

		db.service_mut("mysql").unwrap().units[0].annotations.clear();
		update_landscape(&mut db);
		assert!(!db.service("mysql").unwrap().landscape.needs_reboot);
		assert!(!db.environment.landscape.needs_reboot);
	}

	#[test]
	fn destroyed_units_do_not_count() {
		let mut db = db();
		db.service_mut("mysql").unwrap().units[0].lifecycle = Lifecycle::Destroyed;
		update_landscape(&mut db);
		assert!(!db.environment.landscape.needs_reboot);
	}

	#[test]
	fn urls_for_each_target() {
		let db = db();
		assert_eq!(
			landscape_url(&db, LandscapeTarget::Environment, None).as_deref(),
			Some("http://landscape.example.com/computers/criteria/environment:test/")
		);
		assert_eq!(
			landscape_url(&db, LandscapeTarget::Service("mysql"), Some(Intent::Reboot)).as_deref(),
			Some("http://landscape.example.com/computers/criteria/environment:test+service:mysql/+alert:computer-reboot/info#power")
		);
		assert_eq!(landscape_url(&db, LandscapeTarget::Service("wordpress"), None), None);
		assert_eq!(
			landscape_url(
				&db,
				LandscapeTarget::Unit {
					service: "mysql",
					unit: "mysql/0"
				},
				None
			),
			None
		);
	}

	#[test]
	fn no_landscape_url_means_no_links() {
		let mut db = db();
		db.environment.annotations.remove("landscape-url");
		assert_eq!(landscape_url(&db, LandscapeTarget::Environment, None), None);
	}

	#[test]
	fn badges_follow_the_flags() {
		let mut db = db();
		update_landscape(&mut db);
		let badge = landscape_badge(&db, LandscapeTarget::Service("mysql"), Intent::Reboot, Some("round")).unwrap();
		assert_eq!(badge.sprite, "landscape_restart_round");
		assert!(badge.link.unwrap().ends_with("+alert:computer-reboot/info#power"));

		assert_eq!(landscape_badge(&db, LandscapeTarget::Service("mysql"), Intent::Security, None), None);
		assert_eq!(landscape_badge(&db, LandscapeTarget::Service("wordpress"), Intent::Reboot, None), None);

		let unit_badge = landscape_badge(
			&db,
			LandscapeTarget::Unit {
				service: "mysql",
				unit: "mysql/0",
			},
			Intent::Reboot,
			None,
		)
		.unwrap();
		assert_eq!(unit_badge.sprite, "landscape_restart");
		assert_eq!(unit_badge.link, None);
	}
}
