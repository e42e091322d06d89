//! `basebridge-middleware` – the transport seam.
//!
//! Routes messages between the bridge and whatever transport the host wires
//! up, without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
