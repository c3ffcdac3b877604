// Persistence layer: on-device write-ahead cache and the dual-write
// gateway that reconciles it with the remote record store.

pub mod gateway;
pub mod local_cache;
