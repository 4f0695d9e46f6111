//! Lowest-common-ancestor aggregation over taxonomic lineages.
//!
//! Per-hash lineage sets are reduced to a single LCA lineage, LCAs are
//! counted, and counts are then climbed up to a target rank so that
//! fine-grained calls collapse into coarser buckets.

use std::collections::{BTreeSet, HashMap};

use clap::ValueEnum;

use crate::taxonomy::{Lineage, LineagePair, Rank};

/// Distinct lineages asserted for one hash value.
pub type LineageSet = BTreeSet<Lineage>;

/// hash value -> every lineage asserted for it.
pub type HashAssignments = HashMap<u64, LineageSet>;

pub type LineageCounts = HashMap<Lineage, u64>;

const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct Node {
    pair: Option<LineagePair>,
    children: Vec<usize>,
    /// An input lineage ends at this node.
    terminal: bool,
}

/// Trie over rank/name pair sequences, nodes addressed by index.
///
/// Node 0 is the root (empty lineage). Every other node has exactly one
/// parent: its lineage minus the last pair.
#[derive(Debug, Clone)]
pub struct TaxonomyTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcaReason {
    /// Reached a node without children, or the end of an input lineage
    /// with at most one child below it.
    Leaf,
    /// Stopped at a node with two or more children.
    Disagreement,
}

impl Default for TaxonomyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxonomyTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                pair: None,
                children: Vec::new(),
                terminal: false,
            }],
        }
    }

    pub fn build<'a, I>(lineages: I) -> Self
    where
        I: IntoIterator<Item = &'a Lineage>,
    {
        let mut tree = Self::new();
        for lineage in lineages {
            tree.insert(lineage);
        }
        tree
    }

    pub fn insert(&mut self, lineage: &Lineage) {
        debug_assert!(
            lineage.pairs().windows(2).all(|w| w[0].rank < w[1].rank),
            "ranks must increase along a lineage: {:?}",
            lineage
        );

        let mut current = ROOT;
        for pair in lineage.pairs() {
            let existing = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c].pair.as_ref() == Some(pair));

            current = match existing {
                Some(child) => child,
                None => {
                    let id = self.nodes.len();
                    self.nodes.push(Node {
                        pair: Some(pair.clone()),
                        children: Vec::new(),
                        terminal: false,
                    });
                    self.nodes[current].children.push(id);
                    id
                }
            };
        }
        self.nodes[current].terminal = true;
    }

    /// True when no lineage has been inserted.
    pub fn is_empty(&self) -> bool {
        let root = &self.nodes[ROOT];
        root.children.is_empty() && !root.terminal
    }

    /// Walk down from the root while the path is unambiguous.
    ///
    /// A node with two or more children stops the walk with
    /// [`LcaReason::Disagreement`], even when an input lineage ends there.
    /// Otherwise an input lineage that ends on the path stops it as a
    /// [`LcaReason::Leaf`], so a prefix (including the empty, unknown
    /// lineage) wins over its single line of descendants.
    ///
    /// A tree with nothing inserted has nothing to disagree about and
    /// returns the root as a `Leaf`. Callers that need to tell this apart
    /// check [`TaxonomyTree::is_empty`] first.
    pub fn find_lca(&self) -> (Lineage, LcaReason) {
        let mut lineage = Lineage::root();
        let mut current = ROOT;

        loop {
            let node = &self.nodes[current];
            match node.children.as_slice() {
                [_, _, ..] => return (lineage, LcaReason::Disagreement),
                _ if node.terminal => return (lineage, LcaReason::Leaf),
                [] => return (lineage, LcaReason::Leaf),
                [only] => {
                    current = *only;
                    if let Some(pair) = &self.nodes[current].pair {
                        lineage.push(pair.clone());
                    }
                }
            }
        }
    }
}

/// LCA of an arbitrary set of lineages.
pub fn lca_of<'a, I>(lineages: I) -> (Lineage, LcaReason)
where
    I: IntoIterator<Item = &'a Lineage>,
{
    TaxonomyTree::build(lineages).find_lca()
}

/// Count how many hashes resolve to each LCA lineage.
pub fn count_lca_for_assignments(assignments: &HashAssignments) -> LineageCounts {
    let mut counts = LineageCounts::new();
    for lineages in assignments.values() {
        let (lca, _) = lca_of(lineages);
        *counts.entry(lca).or_insert(0) += 1;
    }
    counts
}

/// Counts ordered by descending count, ties broken by lineage.
pub fn sorted_counts(counts: &LineageCounts) -> Vec<(Lineage, u64)> {
    let mut items: Vec<(Lineage, u64)> =
        counts.iter().map(|(l, c)| (l.clone(), *c)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items
}

/// Strip pairs off the leaf end until the lineage is empty or its
/// deepest rank is one of `stop_ranks`.
pub fn climb_to(lineage: &Lineage, stop_ranks: &[Rank]) -> Lineage {
    let mut climbed = lineage.clone();
    while let Some(rank) = climbed.rank() {
        if stop_ranks.contains(&rank) {
            break;
        }
        climbed.pop();
    }
    climbed
}

/// Merge counts into buckets at the stop ranks.
///
/// `counts` must be sorted by descending count: processing stops at the
/// first entry below `threshold`, which is then equivalent to filtering.
pub fn aggregate_to_level(
    counts: &[(Lineage, u64)],
    stop_ranks: &[Rank],
    threshold: u64,
) -> LineageCounts {
    debug_assert!(
        counts.windows(2).all(|w| w[0].1 >= w[1].1),
        "counts must be sorted by descending count"
    );

    let mut aggregated = LineageCounts::new();
    for (lineage, count) in counts {
        if *count < threshold {
            break;
        }
        *aggregated.entry(climb_to(lineage, stop_ranks)).or_insert(0) += count;
    }
    aggregated
}

/// Order-independent version of [`aggregate_to_level`].
pub fn aggregate_unsorted(
    counts: &LineageCounts,
    stop_ranks: &[Rank],
    threshold: u64,
) -> LineageCounts {
    let mut aggregated = LineageCounts::new();
    for (lineage, count) in counts.iter().filter(|(_, c)| **c >= threshold) {
        *aggregated.entry(climb_to(lineage, stop_ranks)).or_insert(0) += count;
    }
    aggregated
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyStatus {
    Found,
    Disagree,
    NoMatch,
}

/// Resolve a signature's LCA counts into one lineage.
///
/// A tree is built over every LCA seen on at least `threshold` hashes; its
/// own LCA is the classification. Hashes whose LCA is the root carry no
/// taxonomic signal and are left out of the tree.
pub fn classify_counts(counts: &LineageCounts, threshold: u64) -> (Lineage, ClassifyStatus) {
    let mut tree = TaxonomyTree::new();
    for (lineage, count) in sorted_counts(counts) {
        if count < threshold {
            break;
        }
        if !lineage.is_empty() {
            tree.insert(&lineage);
        }
    }

    if tree.is_empty() {
        return (Lineage::root(), ClassifyStatus::NoMatch);
    }
    match tree.find_lca() {
        (lineage, LcaReason::Leaf) => (lineage, ClassifyStatus::Found),
        (lineage, LcaReason::Disagreement) => (lineage, ClassifyStatus::Disagree),
    }
}

/// Which aggregated buckets count towards a chimera call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChimeraPolicy {
    /// Two or more buckets whose deepest rank is the filter rank.
    AtFilterRank,
    /// Two or more non-empty buckets of any rank.
    AnyBuckets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Chimera,
    Other,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Chimera => "chimera",
            Verdict::Other => "other",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChimeraCall {
    pub verdict: Verdict,
    /// Buckets that took part in the decision, sorted.
    pub lineages: Vec<Lineage>,
}

pub fn call_chimera(
    buckets: &LineageCounts,
    policy: ChimeraPolicy,
    filter_rank: Rank,
) -> ChimeraCall {
    let mut lineages: Vec<Lineage> = buckets
        .keys()
        .filter(|l| match policy {
            ChimeraPolicy::AtFilterRank => l.rank() == Some(filter_rank),
            ChimeraPolicy::AnyBuckets => !l.is_empty(),
        })
        .cloned()
        .collect();
    lineages.sort();

    let verdict = if lineages.len() >= 2 {
        Verdict::Chimera
    } else {
        Verdict::Other
    };
    ChimeraCall { verdict, lineages }
}
