//! Live Log Relay
//!
//! Streams a run's execution log from the log store to a browser as
//! Server-Sent Events: replay everything written so far, then tail new
//! records until the end-of-stream marker, a disconnect, or shutdown.
//!
//! - `store`: log store abstraction and cancellable reads
//! - `redis_store`: Redis Streams implementation of the store
//! - `codec`: decoding of stored records and end-of-stream detection
//! - `transport`: SSE event delivery and the paced writer
//! - `session`: the replay/tail state machine

pub mod codec;
pub mod redis_store;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
pub mod memory;

pub use redis_store::RedisLogStore;
pub use session::{RelayConfig, RelaySession, SessionOutcome};
pub use store::{LogStore, LogStoreClient};
pub use transport::ChannelWriter;
