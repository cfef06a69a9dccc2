//! Edge-resident HTTP caching and rate-limiting proxy fronting the Stacks
//! chain API, a token-metadata API, a stats database, a contract-call
//! executor, and a webhook sink.

pub mod actors;
pub mod handler_runtime;
pub mod known_index;
pub mod router;
