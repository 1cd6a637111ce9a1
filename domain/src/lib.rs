//! Domain layer: resolving the publish destination and talking to Pub/Sub.
//!
//! The `web` crate depends only on [`topic::Publisher`] and [`error::Error`], so the
//! messaging backend can be swapped or mocked without touching request handling.

pub mod credentials;
pub mod error;
pub mod gateway;
pub mod topic;
