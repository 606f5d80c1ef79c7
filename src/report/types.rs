use serde::{Deserialize, Serialize};

/// Error captured for a failing spec, as published by the page under test.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpecError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
}

/// One spec in the raw report tree. A spec is a single test: it contributes
/// exactly one entry to the totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Spec {
    pub passed: bool,
    pub full_title: String,
    pub error: Option<SpecError>,
}

/// A suite node: holds specs plus nested suites, both optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Suite {
    pub specs: Vec<Spec>,
    pub suites: Vec<Suite>,
}

/// Raw status report published by the page under test when its suite ends.
///
/// All fields are defaulted so a partial payload still deserializes; a
/// missing tree simply yields empty counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawReport {
    pub passed: bool,
    pub duration_sec: f64,
    #[serde(flatten)]
    pub root: Suite,
}

impl RawReport {
    /// Collapse the suite tree into flat counts plus failing-spec
    /// descriptors.
    pub fn summarize(&self) -> ReportSummary {
        let mut summary = ReportSummary {
            runtime_ms: (self.duration_sec * 1000.0) as u64,
            ..Default::default()
        };
        walk(&self.root, &mut summary);
        summary
    }
}

fn walk(suite: &Suite, summary: &mut ReportSummary) {
    for spec in &suite.specs {
        summary.total += 1;
        if spec.passed {
            summary.passed += 1;
        } else {
            summary.failed += 1;
            summary.failures.push(FailedSpec {
                title: spec.full_title.clone(),
                message: spec.error.as_ref().and_then(|e| e.message.clone()),
                stack: spec.error.as_ref().and_then(|e| e.stack.clone()),
            });
        }
    }
    for child in &suite.suites {
        walk(child, summary);
    }
}

/// Descriptor for one failing test, kept for the console summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailedSpec {
    pub title: String,
    pub message: Option<String>,
    pub stack: Option<String>,
}

/// Simplified per-session counts. The grid's job API only accepts this flat
/// shape, not the full tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub runtime_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedSpec>,
}

/// Result of one browser session. `summary` is `None` when the session never
/// produced a report (init failure, harness error). Never mutated once
/// recorded.
#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    pub summary: Option<ReportSummary>,
    raw_passed: bool,
}

impl SessionOutcome {
    pub fn from_raw(raw: &RawReport) -> Self {
        Self {
            summary: Some(raw.summarize()),
            raw_passed: raw.passed,
        }
    }

    /// Outcome for a session that ended without any report.
    pub fn no_results() -> Self {
        Self::default()
    }

    /// Whether the grid job should be marked passed: a report was produced
    /// and it declared itself passed.
    pub fn job_passed(&self) -> bool {
        self.summary.is_some() && self.raw_passed
    }
}
