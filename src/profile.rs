//! Persisted security profile for a skill listing.
//!
//! A profile is created at ingestion time with heuristic-only dimension
//! values and then mutated dimension-by-dimension by the re-scoring drivers.
//! The stored detail record is a typed struct with named optional fields
//! rather than a key-value bag, so a driver can merge its one dimension
//! without touching (or typo-ing) the other five.

use serde::{Deserialize, Serialize};

use crate::scan::ScanFindingsSummary;
use crate::scorer::{ScoreBreakdown, SecurityGrade};

/// Stored per-profile dimension values. Fields are optional because older
/// records predate some dimensions; [`StoredDetails::breakdown`] fills gaps
/// with the scorer's documented defaults.
///
/// `virusTotalScore` is a migration artifact: a placeholder scan dimension
/// from before the real scanner existed. It is read as a fallback when
/// `scanScore` is absent and cleared the first time a real scan score is
/// written. It is never written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_trust_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auditability_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virus_total_score: Option<u8>,
    /// Latest scan summary, retained for display only. Scoring uses the
    /// derived `scan_score`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_findings: Option<ScanFindingsSummary>,
}

impl StoredDetails {
    /// The scan dimension value, falling back to the legacy key for records
    /// never scanned with the newer engine.
    pub fn effective_scan_score(&self) -> Option<u8> {
        self.scan_score.or(self.virus_total_score)
    }

    /// Materialize the six-dimension breakdown, substituting the documented
    /// default wherever a dimension was never computed.
    pub fn breakdown(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            permission_score: self.permission_score.unwrap_or(15),
            author_trust_score: self.author_trust_score.unwrap_or(3),
            network_score: self.network_score.unwrap_or(10),
            community_score: self.community_score.unwrap_or(5),
            auditability_score: self.auditability_score.unwrap_or(2),
            scan_score: self.effective_scan_score().unwrap_or(15),
        }
    }

    /// Write a real scan score, retiring the legacy key.
    pub fn set_scan_score(&mut self, score: u8, findings: Option<ScanFindingsSummary>) {
        self.scan_score = Some(score);
        self.virus_total_score = None;
        if findings.is_some() {
            self.scan_findings = findings;
        }
    }
}

impl From<ScoreBreakdown> for StoredDetails {
    fn from(b: ScoreBreakdown) -> Self {
        Self {
            permission_score: Some(b.permission_score),
            author_trust_score: Some(b.author_trust_score),
            network_score: Some(b.network_score),
            community_score: Some(b.community_score),
            auditability_score: Some(b.auditability_score),
            scan_score: Some(b.scan_score),
            virus_total_score: None,
            scan_findings: None,
        }
    }
}

/// The entity being scored: one skill listing's security state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSecurityProfile {
    pub id: String,
    /// Stable, human-readable, unique.
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// External-identity handle; anonymous skills have none.
    #[serde(default)]
    pub author_github: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    /// Concatenated SKILL.md and bundled script sources, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_md_content: Option<String>,
    #[serde(default)]
    pub security_score: u32,
    /// `None` renders as "Unrated" upstream, never as an error.
    #[serde(default)]
    pub security_grade: Option<SecurityGrade>,
    #[serde(default)]
    pub security_details: StoredDetails,
}

impl SkillSecurityProfile {
    /// Replace the detail record, recomputing total and grade from it. This
    /// is the only way details are persisted, so score and grade can never
    /// drift from the dimension values.
    pub fn set_details(&mut self, details: StoredDetails) {
        let total = details.breakdown().total();
        self.security_score = total;
        self.security_grade = Some(SecurityGrade::from_score(total));
        self.security_details = details;
    }

    pub fn grade_label(&self) -> &'static str {
        match self.security_grade {
            Some(g) => g.as_str(),
            None => "Unrated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::Severity;

    fn empty_profile(slug: &str) -> SkillSecurityProfile {
        SkillSecurityProfile {
            id: format!("id-{slug}"),
            slug: slug.to_string(),
            name: slug.to_string(),
            category: String::new(),
            author_github: None,
            repo_url: None,
            skill_md_content: None,
            security_score: 0,
            security_grade: None,
            security_details: StoredDetails::default(),
        }
    }

    #[test]
    fn test_breakdown_applies_defaults() {
        let details = StoredDetails::default();
        let b = details.breakdown();
        assert_eq!(b.total(), 50);
    }

    #[test]
    fn test_legacy_scan_key_fallback() {
        let details = StoredDetails {
            virus_total_score: Some(20),
            ..Default::default()
        };
        assert_eq!(details.effective_scan_score(), Some(20));
        assert_eq!(details.breakdown().scan_score, 20);
    }

    #[test]
    fn test_set_scan_score_retires_legacy_key() {
        let mut details = StoredDetails {
            virus_total_score: Some(20),
            ..Default::default()
        };
        details.set_scan_score(
            30,
            Some(ScanFindingsSummary {
                total_findings: 0,
                highest_severity: Severity::Safe,
                threat_names: vec![],
                scanned_at: None,
            }),
        );
        assert_eq!(details.scan_score, Some(30));
        assert_eq!(details.virus_total_score, None);
        assert!(details.scan_findings.is_some());
    }

    #[test]
    fn test_set_details_keeps_grade_consistent() {
        let mut profile = empty_profile("notes");
        let details = StoredDetails {
            permission_score: Some(20),
            author_trust_score: Some(15),
            network_score: Some(15),
            community_score: Some(10),
            auditability_score: Some(10),
            scan_score: Some(30),
            ..Default::default()
        };
        profile.set_details(details);
        assert_eq!(profile.security_score, 100);
        assert_eq!(profile.security_grade, Some(crate::scorer::SecurityGrade::S));
    }

    #[test]
    fn test_grade_label_unrated() {
        let profile = empty_profile("mystery");
        assert_eq!(profile.grade_label(), "Unrated");
    }

    #[test]
    fn test_details_json_uses_camel_case_keys() {
        let details = StoredDetails {
            permission_score: Some(14),
            scan_score: Some(30),
            ..Default::default()
        };
        let json = serde_json::to_string(&details).unwrap();
        assert!(json.contains("\"permissionScore\":14"));
        assert!(json.contains("\"scanScore\":30"));
        assert!(!json.contains("virusTotalScore"));
    }

    #[test]
    fn test_details_json_reads_legacy_key() {
        let details: StoredDetails =
            serde_json::from_str(r#"{"permissionScore":12,"virusTotalScore":10}"#).unwrap();
        assert_eq!(details.permission_score, Some(12));
        assert_eq!(details.virus_total_score, Some(10));
    }
}
