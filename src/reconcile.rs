//! Three-stage reconciliation of alignment hits: split-hit merging,
//! overlap suppression, and representative selection.
//!
//! All stages mutate the collection in place and run as single forward
//! sweeps over index pairs: a write made for one pair is visible to
//! every later pair in the same stage. Stage order matters (merging
//! changes the spans the suppressor compares) and is fixed by the
//! pipeline driver.

use indexmap::IndexMap;

use crate::hit::HitRecord;

/// Residues of overlap tolerated on the subject axis when deciding
/// whether two hits are fragments of one split alignment.
const SPLIT_TOLERANCE: i64 = 5;

/// Fraction of a hit's query span that must fall inside a better hit's
/// span before the covered hit is retired.
const COVERAGE_FRACTION: f64 = 0.8;

/// Group hit indices by subject id, first-seen subject order, input
/// order within each group.
fn subject_groups(hits: &[HitRecord]) -> Vec<Vec<usize>> {
    let mut groups: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (idx, hit) in hits.iter().enumerate() {
        groups.entry(hit.subject.as_str()).or_default().push(idx);
    }
    groups.into_values().collect()
}

/// Two same-subject hits are a split pair when their subject spans are
/// disjoint, tolerating up to `SPLIT_TOLERANCE` residues of overlap
/// from alignment edge effects.
fn is_split_pair(h1: &HitRecord, h2: &HitRecord) -> bool {
    h1.subject_end - SPLIT_TOLERANCE <= h2.subject_start
        || h2.subject_end - SPLIT_TOLERANCE <= h1.subject_start
}

/// Extend the earlier hit with the later hit's outer coordinates and
/// retire the later hit. Whichever end of the earlier hit falls short
/// on the subject axis is pulled out to the later hit's extremum, the
/// query coordinate carried along with it.
///
/// Assumes query and subject ends move together; a reverse-strand hit
/// can violate that, and the merge does not check.
fn merge_pair(hits: &mut [HitRecord], i: usize, j: usize) {
    let (sub_start, sub_end, q_start, q_end) = {
        let h2 = &hits[j];
        (h2.subject_start, h2.subject_end, h2.query_start, h2.query_end)
    };
    let h1 = &mut hits[i];
    if h1.subject_end < sub_end {
        h1.subject_end = sub_end;
        h1.query_end = q_end;
    } else {
        h1.subject_start = sub_start;
        h1.query_start = q_start;
    }
    hits[j].mark_redundant();
}

/// Detect same-subject hits that are disjoint fragments of one true
/// alignment (a query spanning a fusion protein or a long insertion
/// aligns in pieces) and coalesce each detected pair into the
/// earlier-indexed hit.
///
/// Pairs are visited once, `i < j` in input order. Because a merge
/// rewrites coordinates mid-sweep, chains of three or more fragments
/// may only partially coalesce in one invocation; that is defined
/// behavior. Already-retired hits still participate.
///
/// Returns the number of pairs merged.
pub fn merge_split_hits(hits: &mut [HitRecord]) -> usize {
    let mut merged = 0;
    for group in subject_groups(hits) {
        for a in 0..group.len() {
            for b in (a + 1)..group.len() {
                let (i, j) = (group[a], group[b]);
                if is_split_pair(&hits[i], &hits[j]) {
                    merge_pair(hits, i, j);
                    merged += 1;
                }
            }
        }
    }
    merged
}

/// Query-axis overlap test with the span-length gate applied to the
/// `h2` role: spans must intersect, `h2`'s span must not be negative,
/// and the length ratio must satisfy `ratio <= 1.1 || ratio >= 0.9`.
/// The two bounds are OR'd, so any positive-length pair passes; the
/// gate only rejects degenerate spans.
fn comparable_overlap(h1: &HitRecord, h2: &HitRecord) -> bool {
    if h1.query_end < h2.query_start || h1.query_start > h2.query_end {
        return false;
    }
    if h2.query_end - h2.query_start < 0 {
        return false;
    }
    let ratio = h1.query_span() as f64 / h2.query_span() as f64;
    ratio <= 1.1 || ratio >= 0.9
}

/// Among same-subject hits whose query spans overlap with comparable
/// lengths, keep the higher-identity hit; equal identity keeps the
/// earlier-indexed hit. Runs over every ordered pair, including hits
/// already retired by merging: identity alone drives the decision, so
/// a retired hit can still retire a lower-identity one.
///
/// Returns the number of hits newly retired.
pub fn suppress_overlaps(hits: &mut [HitRecord]) -> usize {
    let mut suppressed = 0;
    for group in subject_groups(hits) {
        for &i in &group {
            for &j in &group {
                if i == j {
                    continue;
                }
                if !comparable_overlap(&hits[i], &hits[j]) {
                    continue;
                }
                let h1_wins = hits[i].identity > hits[j].identity
                    || (hits[i].identity == hits[j].identity && i < j);
                let loser = if h1_wins { j } else { i };
                if hits[loser].is_representative() {
                    suppressed += 1;
                }
                hits[loser].mark_redundant();
            }
        }
    }
    suppressed
}

/// Resolve residual query-coverage conflicts among hits still flagged
/// representative, across subjects: a hit strictly contained in an
/// earlier hit's query span is retired, as is a hit whose span is
/// covered more than `COVERAGE_FRACTION` by the intersection with an
/// earlier hit.
///
/// Pairs are visited `i < j` with the earlier-indexed hit fixed in the
/// `h1` role; the stage never reconsiders retiring `h1` in favor of
/// `h2`, and hits retired earlier in the sweep are skipped.
///
/// Returns the number of hits retired.
pub fn select_representatives(hits: &mut [HitRecord]) -> usize {
    let mut retired = 0;
    for i in 0..hits.len() {
        if !hits[i].is_representative() {
            continue;
        }
        for j in (i + 1)..hits.len() {
            if !hits[j].is_representative() {
                continue;
            }
            if hits[i].query_start > hits[j].query_end
                || hits[i].query_end < hits[j].query_start
            {
                continue;
            }
            let cs = hits[i].query_start.max(hits[j].query_start);
            let ce = hits[i].query_end.min(hits[j].query_end);

            if hits[i].query_start < hits[j].query_start
                && hits[i].query_end > hits[j].query_end
            {
                hits[j].mark_redundant();
                retired += 1;
            }

            if hits[j].query_span() == 0 {
                continue;
            }
            let coverage = ((ce - cs).abs() + 1) as f64 / hits[j].query_span() as f64;
            if coverage > COVERAGE_FRACTION && hits[j].is_representative() {
                hits[j].mark_redundant();
                retired += 1;
            }
        }
    }
    retired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit::HitRecord;

    fn hit(subject: &str, identity: f64, qs: i64, qe: i64, ss: i64, se: i64) -> HitRecord {
        let identity = identity.to_string();
        let (qs, qe, ss, se) = (qs.to_string(), qe.to_string(), ss.to_string(), se.to_string());
        let fields = [
            "Q1",
            subject,
            identity.as_str(),
            "100",
            "0",
            "5",
            qs.as_str(),
            qe.as_str(),
            ss.as_str(),
            se.as_str(),
            "1e-30",
            "200.0",
        ];
        HitRecord::from_fields(&fields).unwrap()
    }

    #[test]
    fn split_tolerance_boundary() {
        // Subject spans overlapping by exactly the tolerance still merge.
        let mut hits = vec![hit("S1", 90.0, 1, 50, 1, 100), hit("S1", 85.0, 45, 90, 95, 200)];
        assert_eq!(merge_split_hits(&mut hits), 1);

        // One residue past the tolerance and the pair is left alone.
        let mut hits = vec![hit("S1", 90.0, 1, 50, 1, 100), hit("S1", 85.0, 45, 90, 94, 200)];
        assert_eq!(merge_split_hits(&mut hits), 0);
        assert!(hits[1].is_representative());
    }

    #[test]
    fn merge_extends_end_and_retires_fragment() {
        let mut hits = vec![
            hit("S1", 90.0, 1, 50, 1, 100),
            hit("S1", 85.0, 45, 150, 96, 200),
        ];
        assert_eq!(merge_split_hits(&mut hits), 1);
        assert_eq!(hits[0].subject_start, 1);
        assert_eq!(hits[0].subject_end, 200);
        assert_eq!(hits[0].query_start, 1);
        assert_eq!(hits[0].query_end, 150);
        assert!(hits[0].is_representative());
        assert!(!hits[1].is_representative());
    }

    #[test]
    fn merge_extends_start_for_reverse_ordered_fragments() {
        // The earlier hit already has the larger subject end, so it
        // absorbs the later fragment's start instead.
        let mut hits = vec![
            hit("S1", 85.0, 45, 150, 96, 200),
            hit("S1", 90.0, 1, 50, 1, 100),
        ];
        assert_eq!(merge_split_hits(&mut hits), 1);
        assert_eq!(hits[0].subject_start, 1);
        assert_eq!(hits[0].subject_end, 200);
        assert_eq!(hits[0].query_start, 1);
        assert_eq!(hits[0].query_end, 150);
        assert!(!hits[1].is_representative());
    }

    #[test]
    fn hits_on_different_subjects_never_merge() {
        let mut hits = vec![hit("S1", 90.0, 1, 50, 1, 50), hit("S2", 85.0, 60, 90, 60, 90)];
        assert_eq!(merge_split_hits(&mut hits), 0);
    }

    #[test]
    fn sweep_order_is_visible_to_later_pairs() {
        // First pair merges 1-50 with 105-150, growing the first hit to
        // subject 1-150. The middle fragment 55-100 then overlaps the
        // grown hit by more than the tolerance and is no longer a split
        // partner for it, but still merges into the (already retired)
        // second hit.
        let mut hits = vec![
            hit("S1", 90.0, 1, 50, 1, 50),
            hit("S1", 88.0, 105, 150, 105, 150),
            hit("S1", 86.0, 55, 100, 55, 100),
        ];
        assert_eq!(merge_split_hits(&mut hits), 2);
        assert_eq!(hits[0].subject_end, 150);
        assert_eq!(hits[0].query_end, 150);
        assert!(hits[0].is_representative());
        // Retired mid-sweep, then mutated by its own later pair.
        assert!(!hits[1].is_representative());
        assert_eq!(hits[1].subject_start, 55);
        assert!(!hits[2].is_representative());
    }

    #[test]
    fn lower_identity_overlap_is_suppressed() {
        let mut hits = vec![
            hit("S1", 95.0, 1, 50, 1, 50),
            hit("S1", 90.0, 10, 60, 200, 250),
        ];
        assert_eq!(suppress_overlaps(&mut hits), 1);
        assert!(hits[0].is_representative());
        assert!(!hits[1].is_representative());
    }

    #[test]
    fn equal_identity_keeps_first_seen() {
        let mut hits = vec![
            hit("S1", 90.0, 1, 50, 1, 50),
            hit("S1", 90.0, 10, 60, 200, 250),
        ];
        assert_eq!(suppress_overlaps(&mut hits), 1);
        assert!(hits[0].is_representative());
        assert!(!hits[1].is_representative());
    }

    #[test]
    fn disjoint_query_spans_are_not_suppressed() {
        let mut hits = vec![
            hit("S1", 95.0, 1, 50, 1, 50),
            hit("S1", 90.0, 51, 100, 200, 250),
        ];
        assert_eq!(suppress_overlaps(&mut hits), 0);
    }

    #[test]
    fn retired_hit_still_suppresses_lower_identity() {
        let mut hits = vec![
            hit("S1", 98.0, 1, 50, 1, 50),
            hit("S1", 90.0, 5, 55, 200, 250),
        ];
        hits[0].mark_redundant();
        assert_eq!(suppress_overlaps(&mut hits), 1);
        assert!(!hits[1].is_representative());
    }

    #[test]
    fn negative_span_is_rejected_as_h2() {
        // Inverted coordinates on the second hit: the pair is treated
        // as non-overlapping in that direction, and in the other
        // direction the inverted hit loses on identity.
        let mut hits = vec![
            hit("S1", 95.0, 1, 50, 1, 50),
            hit("S1", 90.0, 40, 30, 200, 250),
        ];
        assert_eq!(suppress_overlaps(&mut hits), 1);
        assert!(hits[0].is_representative());
        assert!(!hits[1].is_representative());
    }

    #[test]
    fn strict_containment_retires_contained_hit() {
        // Identity does not matter for containment.
        let mut hits = vec![
            hit("S1", 80.0, 1, 100, 1, 100),
            hit("S2", 99.0, 20, 40, 20, 40),
        ];
        assert_eq!(select_representatives(&mut hits), 1);
        assert!(hits[0].is_representative());
        assert!(!hits[1].is_representative());
    }

    #[test]
    fn coverage_fraction_boundary() {
        // Intersection covers 17/20 = 0.85 of the second hit: retired.
        let mut hits = vec![hit("S1", 90.0, 4, 100, 1, 97), hit("S2", 95.0, 1, 20, 1, 20)];
        assert_eq!(select_representatives(&mut hits), 1);
        assert!(!hits[1].is_representative());

        // 15/20 = 0.75: kept.
        let mut hits = vec![hit("S1", 90.0, 6, 100, 1, 95), hit("S2", 95.0, 1, 20, 1, 20)];
        assert_eq!(select_representatives(&mut hits), 0);
        assert!(hits[1].is_representative());
    }

    #[test]
    fn selector_skips_already_retired_hits() {
        let mut hits = vec![
            hit("S1", 90.0, 1, 100, 1, 100),
            hit("S2", 95.0, 20, 40, 20, 40),
            hit("S3", 92.0, 20, 40, 20, 40),
        ];
        hits[1].mark_redundant();
        assert_eq!(select_representatives(&mut hits), 1);
        assert!(!hits[2].is_representative());
    }

    #[test]
    fn selector_never_retires_the_earlier_hit() {
        // The later hit covers the earlier one completely, but roles
        // are fixed by index order.
        let mut hits = vec![
            hit("S1", 90.0, 20, 40, 20, 40),
            hit("S2", 95.0, 1, 100, 1, 100),
        ];
        assert_eq!(select_representatives(&mut hits), 0);
        assert!(hits[0].is_representative());
        assert!(hits[1].is_representative());
    }
}
