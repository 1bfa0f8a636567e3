//! Security statistics report over the whole profile store.
//!
//! Plain-text output: grade distribution, key risk metrics, the
//! worst-scored skills, and a per-category safety ranking.

use std::collections::BTreeMap;

use eyre::Result;

use crate::profile::SkillSecurityProfile;
use crate::scorer::SecurityGrade;
use crate::store::{for_each_page, ProfileStore};

const GRADES: [SecurityGrade; 5] = [
    SecurityGrade::S,
    SecurityGrade::A,
    SecurityGrade::B,
    SecurityGrade::C,
    SecurityGrade::D,
];

/// Number of worst-scored skills listed in the report.
const WORST_LIMIT: usize = 15;

/// Build the report from every profile in the store.
pub fn security_report(store: &dyn ProfileStore) -> Result<String> {
    let mut profiles = Vec::new();
    for_each_page(store, 1000, |page| {
        profiles.extend(page);
        Ok(())
    })?;
    Ok(render(&profiles))
}

fn render(profiles: &[SkillSecurityProfile]) -> String {
    let mut out = String::new();
    out.push_str("ClawStack Security Report\n");
    out.push_str("=========================\n\n");
    out.push_str(&format!("Total skills analyzed: {}\n", profiles.len()));

    // Grade distribution
    let mut grade_counts: BTreeMap<SecurityGrade, usize> = BTreeMap::new();
    let mut unrated = 0usize;
    for p in profiles {
        match p.security_grade {
            Some(g) => *grade_counts.entry(g).or_insert(0) += 1,
            None => unrated += 1,
        }
    }
    let rated = profiles.len() - unrated;

    out.push_str("\nGrade distribution:\n");
    for grade in GRADES {
        let count = grade_counts.get(&grade).copied().unwrap_or(0);
        let pct = if rated > 0 {
            count as f64 / rated as f64 * 100.0
        } else {
            0.0
        };
        let bar_len = if rated > 0 {
            (count as f64 / rated as f64 * 40.0).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "  Grade {}: {:>5} ({:>5.1}%) {}\n",
            grade,
            count,
            pct,
            "#".repeat(bar_len)
        ));
    }
    out.push_str(&format!("  Unrated: {unrated:>5}\n"));

    // Key risk metrics
    let count_of = |g| grade_counts.get(&g).copied().unwrap_or(0);
    let dangerous = count_of(SecurityGrade::D);
    let caution = count_of(SecurityGrade::C);
    let safe = count_of(SecurityGrade::S) + count_of(SecurityGrade::A);
    let pct = |n: usize| {
        if rated > 0 {
            n as f64 / rated as f64 * 100.0
        } else {
            0.0
        }
    };
    out.push_str("\nKey risk metrics:\n");
    out.push_str(&format!("  Dangerous (D): {dangerous}\n"));
    out.push_str(&format!("  Caution (C):   {caution}\n"));
    out.push_str(&format!(
        "  Combined risk (C+D): {} ({:.1}%)\n",
        dangerous + caution,
        pct(dangerous + caution)
    ));
    out.push_str(&format!("  Safe (S+A): {} ({:.1}%)\n", safe, pct(safe)));

    // Worst-scored skills
    let mut rated_profiles: Vec<&SkillSecurityProfile> =
        profiles.iter().filter(|p| p.security_grade.is_some()).collect();
    rated_profiles.sort_by_key(|p| p.security_score);
    if !rated_profiles.is_empty() {
        out.push_str(&format!("\nLowest-scored skills (up to {WORST_LIMIT}):\n"));
        for (i, p) in rated_profiles.iter().take(WORST_LIMIT).enumerate() {
            out.push_str(&format!(
                "  {:>2}. [{}] {} (score: {}) by {} [{}]\n",
                i + 1,
                p.grade_label(),
                p.name,
                p.security_score,
                p.author_github.as_deref().unwrap_or("unknown"),
                if p.category.is_empty() { "other" } else { &p.category },
            ));
        }
    }

    // Category safety ranking
    let mut by_category: BTreeMap<&str, (u64, usize)> = BTreeMap::new();
    for p in profiles.iter().filter(|p| p.security_grade.is_some()) {
        let cat = if p.category.is_empty() { "other" } else { &p.category };
        let entry = by_category.entry(cat).or_insert((0, 0));
        entry.0 += u64::from(p.security_score);
        entry.1 += 1;
    }
    if !by_category.is_empty() {
        let mut ranking: Vec<(&str, f64, usize)> = by_category
            .into_iter()
            .map(|(cat, (sum, n))| (cat, sum as f64 / n as f64, n))
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));

        out.push_str("\nCategory safety ranking (avg score):\n");
        for (i, (cat, avg, n)) in ranking.iter().enumerate() {
            out.push_str(&format!(
                "  {:>2}. {:<18} avg: {:>5.1}  ({} skills)\n",
                i + 1,
                cat,
                avg,
                n
            ));
        }
    }

    out
}
