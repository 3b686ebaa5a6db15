//! API middleware stack.
//!
//! Authentication and rate limiting belong to the fronting gateway; the
//! only layer here is the access log.

pub mod audit;
