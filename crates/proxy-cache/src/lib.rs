//! The cache layer (§4.2–§4.3): a typed store over an opaque KV collaborator,
//! plus deterministic cache-key derivation.

mod bigint;
mod key;
mod kv;
mod store;

pub use key::CacheKeyBuilder;
pub use kv::{InMemoryKv, KvStore};
pub use store::{CacheStore, CacheStoreConfig};
