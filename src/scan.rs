//! Scan-findings model and scanner output ingestion.
//!
//! The external signature-based scanner emits one result per skill. This
//! module maps that raw JSON into [`ScanFindingsSummary`] records keyed by
//! slug, ready for the scan re-scoring driver.

use std::collections::HashMap;

use chrono::Utc;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Finding severity, ordered from least to most severe so that
/// `Severity::High > Severity::Safe` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Safe,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parse a severity label, case-insensitively. Unknown labels map to
    /// `Low`: the scanner flagged something, but we can't rank it.
    pub fn parse(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "SAFE" => Self::Safe,
            "LOW" => Self::Low,
            "MEDIUM" => Self::Medium,
            "HIGH" => Self::High,
            other => {
                warn!(severity = other, "unknown scanner severity, treating as LOW");
                Self::Low
            }
        }
    }
}

/// Summary of one skill's scan results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanFindingsSummary {
    pub total_findings: u32,
    pub highest_severity: Severity,
    #[serde(default)]
    pub threat_names: Vec<String>,
    #[serde(default)]
    pub scanned_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Raw scanner output
// ---------------------------------------------------------------------------

/// One entry of the scanner's raw output. The scanner names each scanned
/// skill by its slug in `tool_name`.
#[derive(Debug, Deserialize)]
struct RawScanResult {
    tool_name: String,
    #[serde(default)]
    is_safe: bool,
    #[serde(default)]
    total_findings: Option<u32>,
    #[serde(default)]
    findings: Option<RawFindings>,
}

#[derive(Debug, Deserialize)]
struct RawFindings {
    #[serde(default)]
    yara_analyzer: Option<RawYaraFindings>,
}

#[derive(Debug, Deserialize)]
struct RawYaraFindings {
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    threat_names: Vec<String>,
    #[serde(default)]
    total_findings: Option<u32>,
}

/// Top-level scanner output. Newer scanner versions wrap results in
/// `scan_results`; older ones emit a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScanReport {
    Wrapped { scan_results: Vec<RawScanResult> },
    Bare(Vec<RawScanResult>),
}

/// Parse raw scanner JSON into summaries keyed by slug.
pub fn parse_scan_report(raw: &str) -> Result<HashMap<String, ScanFindingsSummary>> {
    let report: RawScanReport =
        serde_json::from_str(raw).wrap_err("Failed to parse scanner output JSON")?;
    let results = match report {
        RawScanReport::Wrapped { scan_results } => scan_results,
        RawScanReport::Bare(results) => results,
    };

    let scanned_at = Utc::now().to_rfc3339();
    let mut summaries = HashMap::with_capacity(results.len());

    for result in results {
        let yara = result.findings.as_ref().and_then(|f| f.yara_analyzer.as_ref());
        let total_findings = result
            .total_findings
            .or_else(|| yara.and_then(|y| y.total_findings))
            .unwrap_or(0);

        let severity = if total_findings == 0 {
            Severity::Safe
        } else {
            match yara.and_then(|y| y.severity.as_deref()) {
                Some(label) => Severity::parse(label),
                // Findings but no severity label: trust the scanner's own
                // safe/unsafe verdict for the floor.
                None if result.is_safe => Severity::Safe,
                None => Severity::Low,
            }
        };

        summaries.insert(
            result.tool_name,
            ScanFindingsSummary {
                total_findings,
                highest_severity: severity,
                threat_names: yara.map(|y| y.threat_names.clone()).unwrap_or_default(),
                scanned_at: Some(scanned_at.clone()),
            },
        );
    }

    Ok(summaries)
}
