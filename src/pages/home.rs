use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use leptos::prelude::*;
use log::warn;
use serde_json::json;

use crate::components::topology::annotations::{
	Intent, LandscapeTarget, landscape_badge, landscape_url, update_landscape,
};
use crate::components::topology::model::Annotations;
use crate::components::topology::{
	Database, Endpoint, Environment, Lifecycle, Notification, Notifications, Relation, Service,
	SimulatedEnvironment, StateChange, StatusBar, StatusBarOptions, TopologyCanvas, TopologyEvent,
	Unit, status_color,
};

/// Number of recent topology events shown in the log.
const EVENT_LOG_LEN: usize = 8;

fn unit(service: &str, n: usize, status: &str) -> Unit {
	Unit {
		id: format!("{service}/{n}"),
		status: status.into(),
		annotations: Annotations::from([(
			"landscape-computer".to_string(),
			json!(format!("+unit:{service}-{n}")),
		)]),
		..Default::default()
	}
}

fn service(id: &str, charm: &str, statuses: &[&str]) -> Service {
	Service {
		id: id.into(),
		name: id.into(),
		charm: format!("cs:precise/{charm}"),
		units: statuses
			.iter()
			.enumerate()
			.map(|(n, status)| unit(id, n, status))
			.collect(),
		annotations: Annotations::from([(
			"landscape-computers".to_string(),
			json!(format!("+service:{id}")),
		)]),
		..Default::default()
	}
}

fn relation(id: &str, a: &str, b: &str, interface: &str) -> Relation {
	Relation {
		id: id.into(),
		endpoints: [
			Endpoint {
				service: a.into(),
				interface: interface.into(),
			},
			Endpoint {
				service: b.into(),
				interface: interface.into(),
			},
		],
		lifecycle: Lifecycle::Committed,
	}
}

/// A small wordpress deployment with a few units in trouble.
fn sample_environment() -> Database {
	let mut db = Database::default();
	db.environment.name = "sandbox".into();
	db.environment.annotations = Annotations::from([
		("landscape-url".to_string(), json!("https://landscape.example.com")),
		("landscape-computers".to_string(), json!("/computers/criteria/environment:sandbox")),
		("landscape-reboot-alert-url".to_string(), json!("+alert:computer-reboot/info#power")),
		("landscape-security-alert-url".to_string(), json!("+alert:security-upgrades/packages/list?filter=security")),
	]);

	let mut wordpress = service("wordpress", "wordpress-15", &["started", "started", "pending"]);
	wordpress.units[1]
		.annotations
		.insert("landscape-needs-reboot".into(), json!(true));
	let mut mysql = service("mysql", "mysql-26", &["started", "error"]);
	mysql.units[1]
		.annotations
		.insert("landscape-security-upgrades".into(), json!(true));
	let mut rsyslog = service("rsyslog", "rsyslog-forwarder-4", &["started", "started", "started"]);
	rsyslog.subordinate = true;

	for s in [
		wordpress,
		mysql,
		service("memcached", "memcached-7", &["started"]),
		service("haproxy", "haproxy-13", &["started", "installed"]),
		rsyslog,
	] {
		db.add_service(s);
	}
	db.add_relation(relation("relation-0", "wordpress", "mysql", "db"));
	db.add_relation(relation("relation-1", "wordpress", "memcached", "cache"));
	db.add_relation(relation("relation-2", "haproxy", "wordpress", "reverseproxy"));
	db.add_relation(relation("relation-3", "wordpress", "rsyslog", "juju-info"));
	update_landscape(&mut db);
	db
}

/// Apply the requests the canvas makes of the application.
fn handle_event(db: &Rc<RefCell<Database>>, event: &TopologyEvent) {
	match event {
		TopologyEvent::AddRelation { source, target } => {
			let mut db = db.borrow_mut();
			let id = format!("relation-{}", db.relations.len());
			db.add_relation(relation(&id, source, target, "juju-info"));
		}
		TopologyEvent::ChangeState(StateChange::DestroyConfirm { service }) => {
			if let Err(e) = db
				.borrow_mut()
				.transition_service(service, Lifecycle::Destroyed)
			{
				warn!("home: {e}");
			}
		}
		_ => {}
	}
}

/// Unit status counts across every service.
fn environment_status(db: &Database) -> BTreeMap<String, u64> {
	let mut totals = BTreeMap::new();
	for s in db.visible_services() {
		for (status, count) in s.status_counts() {
			*totals.entry(status).or_insert(0) += count;
		}
	}
	totals
}

/// Environment status bar and Landscape link, kept in the bottom navbar.
#[component]
fn EnvironmentBar(db: StoredValue<Rc<RefCell<Database>>, LocalStorage>, revision: ReadSignal<u64>) -> impl IntoView {
	let segments = move || {
		revision.track();
		db.with_value(|db| {
			let mut bar = StatusBar::new(StatusBarOptions {
				width: 270.0,
				..Default::default()
			});
			let totals = environment_status(&db.borrow());
			bar.update(&totals);
			bar.segments()
				.iter()
				.map(|segment| {
					let (left, width) = bar.extent(segment);
					let style = format!(
						"position: absolute; left: {left}px; width: {width}px; background: {};",
						status_color(&segment.key)
					);
					view! { <span class="status-segment" style=style title=segment.key.clone()>{segment.count}</span> }
				})
				.collect_view()
		})
	};
	let landscape = move || {
		revision.track();
		db.with_value(|db| {
			let db = db.borrow();
			let link = landscape_url(&db, LandscapeTarget::Environment, None)?;
			let badge = [Intent::Reboot, Intent::Security]
				.into_iter()
				.find_map(|intent| landscape_badge(&db, LandscapeTarget::Environment, intent, None));
			let class = badge.map_or_else(|| "landscape".to_string(), |b| format!("landscape {}", b.sprite));
			Some(view! { <a class=class href=link target="_blank">"Landscape"</a> })
		})
	};

	view! {
		<div class="bottom-navbar">
			<div class="environment-status" style="position: relative; width: 270px; height: 18px;">
				{segments}
			</div>
			{landscape}
		</div>
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let db = Rc::new(RefCell::new(sample_environment()));
	let env: Rc<dyn Environment> = Rc::new(SimulatedEnvironment::new(db.clone()));

	let (revision, set_revision) = signal(0u64);
	let events = RwSignal::new(Vec::<String>::new());
	let messages = RwSignal::new(Vec::<Notification>::new());
	let notifications = Notifications::default();
	notifications.subscribe(move |n| messages.update(|all| all.push(n.clone())));

	let shared = StoredValue::new_local(db.clone());
	let on_event = Callback::new(move |event: TopologyEvent| {
		shared.with_value(|db| handle_event(db, &event));
		events.update(|log| {
			log.push(format!("{event:?}"));
			if log.len() > EVENT_LOG_LEN {
				log.remove(0);
			}
		});
		set_revision.update(|r| *r += 1);
	});

	// The canvas holds `Rc` state, so it stays outside the boundary.
	view! {
		<div class="navbar">
			<h1>"Juju"</h1>
			<p class="subtitle">
				"Drag services to move them. Hold a service to draw a relation. Scroll to zoom."
			</p>
		</div>
		<div id="viewport">
			<TopologyCanvas db=db env=env on_event=on_event notifications=notifications />
		</div>
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>
			<ul class="notifications">
				{move || {
					messages
						.get()
						.into_iter()
						.map(|n| view! { <li class="notification">{n.title}": "{n.message}</li> })
						.collect_view()
				}}
			</ul>
			<ol class="event-log">
				{move || events.get().into_iter().map(|e| view! { <li>{e}</li> }).collect_view()}
			</ol>
			<EnvironmentBar db=shared revision=revision />
		</ErrorBoundary>
	}
}
