//! Cross-database compositional oddities.
//!
//! Hashes whose lineage set only agrees at a very high rank (or not at
//! all) point at shared sequence between unrelated references. Hashes are
//! bucketed by the rank of their LCA, and the raw lineage sets behind
//! high-rank LCAs are clustered to find which references share them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::debug;

use crate::{
    compare::all_pairwise,
    lca::{lca_of, HashAssignments, LineageSet},
    lcadb::LcaDatabase,
    taxonomy::{Lineage, Rank},
    types::OddityRow,
};

/// Hashes keyed by the rank of their LCA; `None` is the root.
pub type RankBuckets = BTreeMap<Option<Rank>, BTreeSet<u64>>;

pub fn rank_buckets(assignments: &HashAssignments) -> RankBuckets {
    let mut buckets = RankBuckets::new();
    for (hashval, lineages) in assignments {
        let (lca, _) = lca_of(lineages);
        buckets.entry(lca.rank()).or_default().insert(*hashval);
    }
    buckets
}

/// Hashes whose LCA is the root or no deeper than `max_rank`.
pub fn confused_hashes(buckets: &RankBuckets, max_rank: Rank) -> BTreeSet<u64> {
    buckets
        .iter()
        .filter(|(rank, _)| rank.map_or(true, |r| r <= max_rank))
        .flat_map(|(_, hashes)| hashes.iter().copied())
        .collect()
}

/// A set of lineages that co-occur on the same hashes.
#[derive(Debug, Clone)]
pub struct MixedCluster {
    pub lineages: LineageSet,
    pub hashes: BTreeSet<u64>,
    pub lca: Lineage,
}

/// Group hashes by their exact lineage set, keeping sets of two or more
/// lineages whose LCA is at or above `target_rank` and that are shared by
/// at least `min_shared` hashes. Largest clusters first.
pub fn mixed_clusters(
    assignments: &HashAssignments,
    target_rank: Rank,
    min_shared: usize,
) -> Vec<MixedCluster> {
    let mut mixdict: HashMap<&LineageSet, (Lineage, BTreeSet<u64>)> = HashMap::new();

    for (hashval, lineages) in assignments {
        if lineages.len() < 2 {
            continue;
        }
        if let Some(entry) = mixdict.get_mut(lineages) {
            entry.1.insert(*hashval);
            continue;
        }
        let (lca, _) = lca_of(lineages);
        if lca.rank().map_or(true, |r| r <= target_rank) {
            mixdict.insert(lineages, (lca, BTreeSet::from([*hashval])));
        }
    }

    let mut clusters: Vec<MixedCluster> = mixdict
        .into_iter()
        .filter(|(_, (_, hashes))| hashes.len() >= min_shared)
        .map(|(lineages, (lca, hashes))| MixedCluster {
            lineages: lineages.clone(),
            hashes,
            lca,
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.hashes
            .len()
            .cmp(&a.hashes.len())
            .then_with(|| a.lineages.cmp(&b.lineages))
    });
    clusters
}

/// A reference genome that contributes hashes to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClusterEntry {
    pub db: usize,
    pub idx: u32,
    pub ident: String,
    pub lineage: Lineage,
}

pub fn cluster_entries(cluster: &MixedCluster, dblist: &[LcaDatabase]) -> Vec<ClusterEntry> {
    let mut entries = BTreeSet::new();
    for hashval in &cluster.hashes {
        for (db_i, db) in dblist.iter().enumerate() {
            let Some(idxs) = db.hashval_to_idx.get(hashval) else {
                continue;
            };
            for idx in idxs {
                let lineage = match db.lineage_for_idx(*idx) {
                    Some(l) if cluster.lineages.contains(l) => l,
                    _ => continue,
                };
                let ident = db.idx_to_ident.get(idx).cloned().unwrap_or_default();
                entries.insert(ClusterEntry {
                    db: db_i,
                    idx: *idx,
                    ident,
                    lineage: lineage.clone(),
                });
            }
        }
    }
    entries.into_iter().collect()
}

/// Per-database inverted hash index, built only when needed.
pub struct SketchIndex<'a> {
    dblist: &'a [LcaDatabase],
    by_idx: Vec<Option<HashMap<u32, HashSet<u64>>>>,
}

impl<'a> SketchIndex<'a> {
    pub fn new(dblist: &'a [LcaDatabase]) -> Self {
        Self {
            dblist,
            by_idx: vec![None; dblist.len()],
        }
    }

    fn hashes(&mut self, db: usize) -> &HashMap<u32, HashSet<u64>> {
        let dblist = self.dblist;
        self.by_idx[db].get_or_insert_with(|| dblist[db].hashes_by_idx())
    }

    /// True if some pair of entries with different lineages has a
    /// similarity below `threshold`, i.e. they are genuinely distinct
    /// genomes.
    pub fn has_distinct_pair(&mut self, entries: &[ClusterEntry], threshold: f64) -> bool {
        for entry in entries {
            self.hashes(entry.db);
        }
        let empty = HashSet::new();
        let sets: Vec<&HashSet<u64>> = entries
            .iter()
            .map(|e| {
                self.by_idx[e.db]
                    .as_ref()
                    .and_then(|m| m.get(&e.idx))
                    .unwrap_or(&empty)
            })
            .collect();

        let similarities = all_pairwise(&sets, |a, b| entries[a].lineage != entries[b].lineage);
        for s in &similarities {
            debug!(
                "{} vs {}: {:.4}",
                entries[s.a].ident, entries[s.b].ident, s.jaccard_index
            );
        }
        similarities.iter().any(|s| s.jaccard_index < threshold)
    }
}

/// Report rows for one cluster: every pair of contributing references
/// that carry different lineages.
pub fn oddity_rows(
    cluster_n: usize,
    cluster: &MixedCluster,
    entries: &[ClusterEntry],
    scaled: u64,
    ksize: u32,
) -> Vec<OddityRow> {
    let mut rows = Vec::new();
    for (i, e1) in entries.iter().enumerate() {
        for e2 in &entries[i + 1..] {
            if e1.lineage == e2.lineage {
                continue;
            }
            rows.push(OddityRow {
                cluster: cluster_n,
                num_lineages: cluster.lineages.len(),
                shared_kmers: cluster.hashes.len() as u64 * scaled,
                ksize,
                rank: cluster.lca.rank_label().to_string(),
                lca: cluster.lca.display(),
                ident1: e1.ident.clone(),
                lineage1: e1.lineage.display(),
                ident2: e2.ident.clone(),
                lineage2: e2.lineage.display(),
            });
        }
    }
    rows
}
