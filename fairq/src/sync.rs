//! Blocking synchronization primitives for in-process producer/consumer
//! pipelines.

pub mod bounded;
pub mod cancel;
