//! Juju environment topology: service boxes laid out by a force simulation,
//! relations between them, pan/zoom, drag-to-move with position annotations,
//! and drag-to-relate.
//!
//! [`Topology`] owns the headless state and is driven through the
//! [`interaction::BINDINGS`] table; [`TopologyCanvas`] wires it to a
//! `<canvas>` element.

pub mod annotations;
mod component;
pub mod config;
pub mod environment;
pub mod error;
pub mod events;
pub mod interaction;
pub mod layout;
pub mod model;
pub mod notifications;
pub mod panzoom;
mod render;
pub mod requests;
pub mod router;
pub mod service_box;
pub mod status_bar;
#[allow(clippy::module_inception)]
pub mod topology;
pub mod viewport;

pub use component::TopologyCanvas;
pub use config::{LayoutConfig, TopologyConfig, ZoomBoundsPolicy};
pub use environment::{EntityKind, Environment, SimulatedEnvironment};
pub use error::{Error, Result};
pub use events::{StateChange, TopologyEvent};
pub use model::{Database, Endpoint, Lifecycle, Relation, Service, Unit};
pub use notifications::{Notification, Notifications, Severity};
pub use render::status_color;
pub use status_bar::{StatusBar, StatusBarOptions};
pub use topology::Topology;
