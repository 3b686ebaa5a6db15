pub mod enums;
pub mod report;
pub mod visit;

pub use report::*;
pub use visit::*;
