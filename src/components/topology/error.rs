use super::model::Lifecycle;

/// Errors raised while wiring up or driving the topology.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("interaction table refers to unknown handler `{name}` ({selector} {event})")]
	UnknownHandler {
		name: &'static str,
		selector: &'static str,
		event: &'static str,
	},
	#[error("service `{id}` cannot move from {from:?} to {to:?}")]
	InvalidTransition {
		id: String,
		from: Lifecycle,
		to: Lifecycle,
	},
	#[error("no service `{0}` on the canvas")]
	UnknownService(String),
	#[error("invalid topology configuration: {0}")]
	Config(#[from] serde_json::Error),
	#[error("invalid topology configuration: `{field}` {reason}")]
	ConfigValue { field: &'static str, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
