pub mod console;
pub mod types;

pub use types::{FailedSpec, RawReport, ReportSummary, SessionOutcome};
