//! Threshold filtering of alignment hits and contig partitioning.

use std::collections::HashSet;

use crate::types::{AlignmentHit, Contig};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterStats {
    /// Query bp over kept hits.
    pub aligned_bp: u64,
    pub skipped_bp: u64,
    pub skipped_alignments: usize,
    /// Query bp over all hits.
    pub all_bp: u64,
    identity_bp: f64,
}

impl FilterStats {
    /// Σ(identity × length) / Σ(length) over every hit, kept or skipped.
    /// `None` when there were no aligned bases.
    pub fn weighted_identity(&self) -> Option<f64> {
        if self.all_bp == 0 {
            None
        } else {
            Some(self.identity_bp / self.all_bp as f64)
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilteredAlignments {
    /// Longest first.
    pub kept: Vec<AlignmentHit>,
    pub skipped: Vec<AlignmentHit>,
    pub stats: FilterStats,
}

impl FilteredAlignments {
    pub fn longest_kept(&self) -> Option<&AlignmentHit> {
        self.kept.first()
    }
}

/// Split hits into those meeting both thresholds and the rest.
///
/// Self hits are dropped. Hits are ordered by descending query length; the
/// keep decision itself is per hit.
pub fn filter_alignments(
    hits: Vec<AlignmentHit>,
    length_threshold: u64,
    percent_threshold: f64,
) -> FilteredAlignments {
    let mut hits: Vec<AlignmentHit> = hits.into_iter().filter(|h| !h.is_self_hit).collect();
    hits.sort_by(|a, b| b.hit_length_qry.cmp(&a.hit_length_qry));

    let mut kept = Vec::new();
    let mut skipped = Vec::new();
    let mut stats = FilterStats::default();

    for hit in hits {
        stats.identity_bp += hit.percent_identity * hit.hit_length_qry as f64;
        stats.all_bp += hit.hit_length_qry;

        if hit.hit_length_qry >= length_threshold && hit.percent_identity >= percent_threshold {
            stats.aligned_bp += hit.hit_length_qry;
            kept.push(hit);
        } else {
            stats.skipped_bp += hit.hit_length_qry;
            stats.skipped_alignments += 1;
            skipped.push(hit);
        }
    }

    FilteredAlignments {
        kept,
        skipped,
        stats,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Query,
    Reference,
}

/// Names of contigs on `side` touched by any of `hits`.
pub fn covered_contigs(hits: &[AlignmentHit], side: Side) -> HashSet<&str> {
    hits.iter()
        .map(|h| match side {
            Side::Query => h.qry_name.as_str(),
            Side::Reference => h.ref_name.as_str(),
        })
        .collect()
}

/// A genome's contigs split into kept and removed.
#[derive(Debug, Clone)]
pub struct ContigPartition {
    records: Vec<Contig>,
    removed: Vec<bool>,
}

impl ContigPartition {
    pub fn kept(&self) -> impl Iterator<Item = &Contig> {
        self.records
            .iter()
            .zip(&self.removed)
            .filter(|(_, removed)| !**removed)
            .map(|(c, _)| c)
    }

    pub fn removed(&self) -> impl Iterator<Item = &Contig> {
        self.records
            .iter()
            .zip(&self.removed)
            .filter(|(_, removed)| **removed)
            .map(|(c, _)| c)
    }

    pub fn bp_removed(&self) -> u64 {
        self.removed().map(Contig::length).sum()
    }

    pub fn bp_total(&self) -> u64 {
        self.records.iter().map(Contig::length).sum()
    }

    pub fn contigs_removed(&self) -> usize {
        self.removed.iter().filter(|r| **r).count()
    }

    pub fn contigs_total(&self) -> usize {
        self.records.len()
    }

    /// Put every contig back on the kept side.
    pub fn reset(&mut self) {
        self.removed.iter_mut().for_each(|r| *r = false);
    }
}

/// Route contigs covered by a kept hit to the removed set.
///
/// Contigs that aligned well to the other genome are the shared sequence,
/// so they are removed and the kept set is what is unique to this genome.
pub fn partition_contigs(records: Vec<Contig>, kept_hits: &[AlignmentHit], side: Side) -> ContigPartition {
    let covered = covered_contigs(kept_hits, side);
    let removed = records
        .iter()
        .map(|c| covered.contains(c.id.as_str()))
        .collect();
    ContigPartition { records, removed }
}

/// True when more than `multiple` × `aligned_bp` was removed.
pub fn removal_exceeds(bp_removed: u64, aligned_bp: u64, multiple: f64) -> bool {
    bp_removed as f64 > multiple * aligned_bp as f64
}

/// Which genome of a pair looks contaminated.
///
/// Excess removal from one genome means the *other* genome carries a lot
/// of sequence matching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contamination {
    Clean,
    First,
    Second,
    Both,
}

impl Contamination {
    pub fn from_excess(first_exceeds: bool, second_exceeds: bool) -> Self {
        match (first_exceeds, second_exceeds) {
            (true, true) => Contamination::Both,
            (true, false) => Contamination::Second,
            (false, true) => Contamination::First,
            (false, false) => Contamination::Clean,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn hit(ref_name: &str, qry_name: &str, len: u64, pid: f64) -> AlignmentHit {
        AlignmentHit {
            ref_name: ref_name.to_string(),
            qry_name: qry_name.to_string(),
            ref_start: 1,
            ref_end: len,
            qry_start: 1,
            qry_end: len,
            percent_identity: pid,
            hit_length_ref: len,
            hit_length_qry: len,
            ref_length: len,
            qry_length: len,
            is_self_hit: false,
        }
    }

    fn contig(id: &str, len: usize) -> Contig {
        Contig {
            id: id.to_string(),
            header: format!("{} desc", id),
            sequence: vec![b'A'; len],
        }
    }

    #[test]
    fn test_filter_scenario() {
        let hits = vec![hit("r1", "ctgB", 100, 80.0), hit("r2", "ctgA", 1000, 99.0)];
        let filtered = filter_alignments(hits, 500, 95.0);

        assert_eq!(filtered.kept.len(), 1);
        assert_eq!(filtered.kept[0].qry_name, "ctgA");
        assert_eq!(filtered.skipped.len(), 1);
        assert_eq!(filtered.skipped[0].qry_name, "ctgB");
        assert_eq!(filtered.stats.aligned_bp, 1000);
        assert_eq!(filtered.stats.skipped_bp, 100);

        let identity = filtered.stats.weighted_identity().unwrap();
        assert!((identity - 97.2727).abs() < 1e-3);
    }

    #[test]
    fn test_filter_keeps_everything_above_thresholds() {
        let hits = vec![hit("r1", "a", 600, 96.0), hit("r2", "b", 700, 100.0)];
        let filtered = filter_alignments(hits, 500, 95.0);
        assert_eq!(filtered.kept.len(), 2);
        assert!(filtered.skipped.is_empty());
        assert_eq!(filtered.longest_kept().unwrap().qry_name, "b");
    }

    #[test]
    fn test_filter_drops_self_hits_and_guards_zero() {
        let mut self_hit = hit("a", "a", 500, 100.0);
        self_hit.is_self_hit = true;
        let filtered = filter_alignments(vec![self_hit], 0, 0.0);
        assert!(filtered.kept.is_empty());
        assert_eq!(filtered.stats.weighted_identity(), None);
    }

    #[test]
    fn test_partition_routes_covered_contigs_to_removed() {
        let kept = vec![hit("r1", "q2", 1000, 99.0)];
        let records = vec![contig("q1", 10), contig("q2", 30), contig("q3", 5)];

        let mut partition = partition_contigs(records.clone(), &kept, Side::Query);
        let removed: Vec<_> = partition.removed().map(|c| c.id.as_str()).collect();
        let kept_ids: Vec<_> = partition.kept().map(|c| c.id.as_str()).collect();
        assert_eq!(removed, vec!["q2"]);
        assert_eq!(kept_ids, vec!["q1", "q3"]);
        assert_eq!(partition.bp_removed(), 30);
        assert_eq!(partition.bp_total(), 45);

        partition.reset();
        assert_eq!(partition.removed().count(), 0);
        assert_eq!(partition.kept().cloned().collect::<Vec<_>>(), records);

        let by_ref = partition_contigs(vec![contig("r1", 4), contig("q2", 3)], &kept, Side::Reference);
        assert_eq!(by_ref.bp_removed(), 4);
    }

    #[test]
    fn test_contamination_threshold() {
        assert!(removal_exceeds(3000, 1000, 2.5));
        assert!(!removal_exceeds(2000, 1000, 2.5));
        assert!(!removal_exceeds(2500, 1000, 2.5));
        assert_eq!(Contamination::from_excess(true, true), Contamination::Both);
        assert_eq!(Contamination::from_excess(false, true), Contamination::First);
        assert_eq!(Contamination::from_excess(false, false), Contamination::Clean);
    }
}
