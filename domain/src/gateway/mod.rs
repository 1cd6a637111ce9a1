//! Clients for external services.

pub mod pubsub;
