//! Webhook-forwarding proxy.
//!
//! Inbound requests are relayed unmodified to a configured upstream and the
//! exchange is recorded as an event in a TTL key-value store. A small read
//! API browses recorded events grouped by originating path.
//!
//! Indexing is best-effort: per-endpoint indexes and aggregate metadata are
//! maintained with unsynchronized read-modify-write against the store, so
//! concurrent saves to the same endpoint can lose an update. Readers
//! tolerate the resulting drift.

pub mod api;
pub mod config;
pub mod domain;
pub mod errors;
pub mod kv;
pub mod store;
