//! Rule conflict and coverage-gap analysis
//!
//! - [`range`] and [`set_overlap`] reduce a variable's criteria to an
//!   interval or an allowed-value set
//! - [`overlap`] compares two such groups
//! - [`conflict`] sweeps rule pairs of one output for intersecting conditions
//! - [`gap`] samples the input space for regions no rule covers

pub mod conflict;
pub mod gap;
pub mod overlap;
pub mod range;
pub mod report;
pub mod set_overlap;

pub use conflict::{sweep, ConflictRecord, ConflictScanner, ConflictSweep, ConflictType, SweepReport};
pub use gap::{find_gaps, Edge, GapBound, GapConstraint, GapRecord, GapReport, GapSampler, SamplingOptions};
pub use overlap::{detect, OverlapRegion, OverlapResult};
pub use range::{build_range, Interval};
pub use report::AnalysisReport;
pub use set_overlap::SetSemantics;
