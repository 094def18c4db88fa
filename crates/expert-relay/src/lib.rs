//! expert-relay
//!
//! The Relay Multiplexer Adapter: one logical pub/sub over a set of relay
//! URLs, with partial-failure publish reporting and cross-relay dedup.

pub mod error;
pub mod filter;
pub mod multiplexer;
pub mod websocket;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use error::RelayError;
pub use filter::Filter;
pub use multiplexer::{PublishOutcome, RelayMultiplexer, Subscription, SubscriptionCloser};
pub use websocket::WebSocketMultiplexer;

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockRelayMultiplexer;
