//! Batch re-scoring drivers.
//!
//! Each driver owns exactly one dimension: scan ingestion owns `scanScore`,
//! author refresh owns `authorTrustScore`. A driver pages through the store,
//! recomputes its dimension from fresh external signal, merges it into the
//! stored detail record (the other five dimensions untouched), recomputes
//! total and grade, and persists per record. One profile's failure never
//! blocks another's: failed lookups fall back to the dimension default only
//! when the dimension was never computed, and failed writes are logged and
//! skipped.
//!
//! Reruns are idempotent: every dimension value is derived purely from the
//! external signal plus the untouched other dimensions.

use std::collections::{BTreeMap, HashMap, HashSet};

use eyre::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::github::ReputationProvider;
use crate::profile::SkillSecurityProfile;
use crate::scan::ScanFindingsSummary;
use crate::scorer::{score_author_trust, score_scan};
use crate::store::{for_each_page, ProfileStore};

/// Page size for cohort iteration.
const PAGE_SIZE: usize = 1000;

/// Outcome of one driver run, for migration reporting. Not consumed by
/// scoring itself.
#[derive(Debug, Default, Serialize)]
pub struct RescoreReport {
    /// Profiles seen.
    pub total: usize,
    /// Profiles whose external signal was found.
    pub matched: usize,
    /// Profiles with no matching external signal (kept prior value or
    /// received the dimension default).
    pub unmatched: usize,
    /// Profiles written back with a changed detail record.
    pub updated: usize,
    /// Profiles whose recompute produced no change (write skipped).
    pub unchanged: usize,
    /// Per-record persistence failures (logged, batch continued).
    pub write_failures: usize,
    /// Before/after grade transition counts, keyed like `"C→B"`.
    pub grade_migrations: BTreeMap<String, usize>,
}

impl RescoreReport {
    fn record_migration(&mut self, old_label: &str, new_label: &str) {
        if old_label != new_label {
            let key = format!("{old_label}→{new_label}");
            *self.grade_migrations.entry(key).or_insert(0) += 1;
        }
    }

    /// Plain-text run summary.
    pub fn summary(&self, title: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("{title}\n"));
        out.push_str(&format!("{}\n\n", "=".repeat(title.len())));
        out.push_str(&format!("Profiles:        {}\n", self.total));
        out.push_str(&format!("Matched:         {}\n", self.matched));
        out.push_str(&format!("Unmatched:       {}\n", self.unmatched));
        out.push_str(&format!("Updated:         {}\n", self.updated));
        out.push_str(&format!("Unchanged:       {}\n", self.unchanged));
        out.push_str(&format!("Write failures:  {}\n", self.write_failures));

        if !self.grade_migrations.is_empty() {
            out.push_str("\nGrade migrations:\n");
            let mut entries: Vec<_> = self.grade_migrations.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (key, count) in entries {
                out.push_str(&format!("  {key}: {count}\n"));
            }
        }
        out
    }
}

/// Merge a recomputed detail record into one profile and persist it,
/// updating the report tallies.
fn persist_recomputed(
    store: &mut dyn ProfileStore,
    mut profile: SkillSecurityProfile,
    details: crate::profile::StoredDetails,
    report: &mut RescoreReport,
) {
    if profile.security_details == details {
        report.unchanged += 1;
        return;
    }

    let old_label = profile.grade_label();
    profile.set_details(details);
    let new_label = profile.grade_label();
    report.record_migration(old_label, new_label);

    match store.update(&profile) {
        Ok(()) => report.updated += 1,
        Err(e) => {
            warn!(slug = %profile.slug, error = %e, "failed to persist re-scored profile");
            report.write_failures += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Scan-result ingestion
// ---------------------------------------------------------------------------

/// Fold scanner output into the scan dimension of every profile.
///
/// Matched profiles get a fresh `scanScore` plus the findings summary for
/// display. Unmatched profiles keep their existing scan value (the legacy
/// `virusTotalScore` is migrated into `scanScore` on the way), defaulting to
/// 15 only when no scan value ever existed.
pub fn apply_scan_results(
    store: &mut dyn ProfileStore,
    results: &HashMap<String, ScanFindingsSummary>,
) -> Result<RescoreReport> {
    let mut report = RescoreReport::default();
    let mut cohort = Vec::new();
    for_each_page(store, PAGE_SIZE, |page| {
        cohort.extend(page);
        Ok(())
    })?;

    info!(profiles = cohort.len(), scanned = results.len(), "applying scan results");

    for profile in cohort {
        report.total += 1;
        let mut details = profile.security_details.clone();

        match results.get(&profile.slug) {
            Some(findings) => {
                report.matched += 1;
                let score = score_scan(Some(findings), None);
                debug!(slug = %profile.slug, score, severity = findings.highest_severity.as_str(), "scan matched");
                details.set_scan_score(score, Some(findings.clone()));
            }
            None => {
                report.unmatched += 1;
                let kept = details.effective_scan_score().unwrap_or(15);
                details.set_scan_score(kept, None);
            }
        }

        persist_recomputed(store, profile, details, &mut report);
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Author-trust refresh
// ---------------------------------------------------------------------------

/// How one author handle resolved during a refresh run.
enum AuthorResolution {
    /// Profile facts fetched (or the author definitively doesn't exist,
    /// which scores the anonymous default).
    Scored(u8),
    /// Lookup failed; existing dimension values stay untouched.
    Failed,
}

/// Recompute the author-trust dimension for every profile from live author
/// profile data. Each unique handle is fetched once per run.
pub async fn refresh_author_scores(
    store: &mut dyn ProfileStore,
    provider: &dyn ReputationProvider,
) -> Result<RescoreReport> {
    let mut report = RescoreReport::default();

    let mut cohort = Vec::new();
    for_each_page(store, PAGE_SIZE, |page| {
        cohort.extend(page);
        Ok(())
    })?;

    let handles: HashSet<String> = cohort
        .iter()
        .filter_map(|p| p.author_github.clone())
        .collect();
    info!(profiles = cohort.len(), authors = handles.len(), "refreshing author trust");

    let mut resolutions: HashMap<String, AuthorResolution> = HashMap::new();
    for handle in &handles {
        let resolution = match provider.lookup(handle).await {
            Ok(Some(snapshot)) => {
                AuthorResolution::Scored(score_author_trust(Some(handle), Some(&snapshot)))
            }
            Ok(None) => {
                debug!(author = %handle, "author not found, scoring anonymous default");
                AuthorResolution::Scored(3)
            }
            Err(e) => {
                warn!(author = %handle, error = %e, "author lookup failed, keeping prior values");
                AuthorResolution::Failed
            }
        };
        resolutions.insert(handle.clone(), resolution);
    }

    for profile in cohort {
        report.total += 1;
        let mut details = profile.security_details.clone();

        let new_score = match profile.author_github.as_deref() {
            // Anonymous skill: explicitly low-trust.
            None => {
                report.matched += 1;
                Some(3)
            }
            Some(handle) => match resolutions.get(handle) {
                Some(AuthorResolution::Scored(score)) => {
                    report.matched += 1;
                    Some(*score)
                }
                Some(AuthorResolution::Failed) | None => {
                    report.unmatched += 1;
                    // Never punish a lookup failure: keep the prior value,
                    // fill the default only if the dimension never existed.
                    details.author_trust_score.is_none().then_some(3)
                }
            },
        };

        if let Some(score) = new_score {
            details.author_trust_score = Some(score);
        }

        persist_recomputed(store, profile, details, &mut report);
    }

    Ok(report)
}
