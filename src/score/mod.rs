//! Aggregation of raw hits into a scored Verdict.
//!
//! The aggregator applies allowlist suppression, orders hits, tallies
//! categories, and computes the total score with a per-category
//! diminishing-returns cap so one noisy rule cannot dominate a verdict.

use crate::allowlist::Allowlist;
use crate::types::{Category, CategoryTally, Hit, Verdict};
use std::collections::BTreeMap;

/// Hits in one category contribute full severity up to this many; each
/// additional hit counts at half weight.
const FULL_WEIGHT_HITS_PER_CATEGORY: usize = 3;

/// Combine `hits` into a Verdict. Suppressed hits stay in the record
/// for auditability; only their score contribution is removed. Output
/// is fully determined by the inputs.
pub fn aggregate(
    mut hits: Vec<Hit>,
    allowlist: &Allowlist,
    limit_reached: bool,
    content_hash: String,
) -> Verdict {
    for hit in &mut hits {
        hit.suppressed = allowlist.suppresses(hit);
    }

    // Severity descending, then offset ascending. The sort is stable,
    // so equal keys keep matcher order (registration, then leftmost).
    hits.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(a.offset.cmp(&b.offset))
    });

    let mut categories: BTreeMap<Category, CategoryTally> = BTreeMap::new();
    let mut scored_per_category: BTreeMap<Category, usize> = BTreeMap::new();
    let mut score = 0.0;

    for hit in &hits {
        let tally = categories.entry(hit.category).or_default();
        if hit.suppressed {
            tally.suppressed_count += 1;
            continue;
        }
        tally.count += 1;

        let scored = scored_per_category.entry(hit.category).or_insert(0);
        let weight = if *scored < FULL_WEIGHT_HITS_PER_CATEGORY {
            f64::from(hit.severity)
        } else {
            f64::from(hit.severity) / 2.0
        };
        *scored += 1;
        score += weight;
    }

    Verdict {
        score,
        categories,
        hits,
        limit_reached,
        content_hash,
    }
}
