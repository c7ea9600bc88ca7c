//! Serialisable event types and the hub that publishes them.
//!
//! All event types derive `serde::Serialize` + `serde::Deserialize` so a
//! front end (status overlay, log shipper) can consume them as JSON.

pub mod events;
pub mod hub;

pub use hub::EventHub;
