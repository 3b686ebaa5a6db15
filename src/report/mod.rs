//! Report lifecycle: draft editing, finalization and token access.
//!
//! State machine per visit: (absent) → DRAFT → FINALIZED. A draft is
//! rewritten in place any number of times; finalization happens exactly once
//! and the storage guard keeps the finalized version fixed afterwards.

pub mod access;
pub mod draft;
pub mod error;
pub mod finalize;
pub mod flag;

pub use access::{generate_access_token, read_by_token, verify_integrity, FinalizedReport, ReportLine};
pub use draft::{load_draft, save_draft, DraftOutcome, DraftSubmission, ResultSubmission};
pub use error::ReportError;
pub use finalize::{finalize, FinalizeOutcome};
pub use flag::compute_flag;
