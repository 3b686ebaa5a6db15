//! API endpoint handlers.
//!
//! Handlers are thin: parse the path, hand the payload to the ledger or the
//! report lifecycle on a blocking connection, map the outcome.

pub mod health;
pub mod reports;
pub mod visits;
