//! The DNS wire-format codec: names, record rdata, and whole messages.
//!
//! This module tree is the sole interesting subject of this crate. It
//! operates only on borrowed buffers and caller-owned scratch space; it
//! performs no I/O and holds no state across calls, so every function
//! here is safe to call concurrently from multiple threads as long as
//! their buffers do not alias.

pub mod message;
pub mod name;
pub mod record;
