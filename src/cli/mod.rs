//! CLI command implementations
//!
//! - `analyze`: conflicts, gaps and the combined report
//! - `lint`: rule script format check
//! - `schema`: JSON schemas of the output types
//! - `util`: shared argument and loading helpers

pub mod analyze;
pub mod lint;
pub mod schema;
pub mod util;

pub use analyze::{cmd_analyze, cmd_conflicts, cmd_gaps};
pub use lint::cmd_lint;
pub use schema::cmd_schema;
