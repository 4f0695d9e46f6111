use std::{fmt, str::FromStr};

use clap::ValueEnum;

use crate::error::Error;

/// Canonical taxonomic ranks, broadest first.
///
/// The derived `Ord` is the rank order used everywhere: a rank compares
/// less than every rank below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum Rank {
    Superkingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Strain,
}

impl Rank {
    pub const ALL: [Rank; 8] = [
        Rank::Superkingdom,
        Rank::Phylum,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
        Rank::Strain,
    ];

    /// Ranks used in lineage spreadsheets (no strain column).
    pub fn without_strain() -> &'static [Rank] {
        &Self::ALL[..7]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Superkingdom => "superkingdom",
            Rank::Phylum => "phylum",
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
            Rank::Strain => "strain",
        }
    }

    /// Every rank from the top down to and including `self`.
    pub fn up_to(self) -> Vec<Rank> {
        Self::ALL.iter().copied().filter(|r| *r <= self).collect()
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| Error::UnknownRank(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineagePair {
    pub rank: Rank,
    pub name: String,
}

impl LineagePair {
    pub fn new(rank: Rank, name: impl Into<String>) -> Self {
        Self {
            rank,
            name: name.into(),
        }
    }
}

/// Ordered rank/name pairs from the root towards the leaf.
///
/// Equality and hashing are structural over the pair sequence, so two
/// lineages are the same taxonomy node iff every pair matches. The empty
/// lineage is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lineage(Vec<LineagePair>);

impl Lineage {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a lineage from positional names, one per rank starting at
    /// superkingdom. Empty trailing names are dropped.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let pairs = Rank::ALL
            .iter()
            .zip(names)
            .map(|(rank, name)| LineagePair::new(*rank, name.as_ref().trim()))
            .collect();
        let mut lineage = Self(pairs);
        lineage.trim_empty();
        lineage
    }

    /// Parse the `;`-joined text form written by [`Lineage::display`].
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::root();
        }
        let names: Vec<&str> = text.split(';').collect();
        Self::from_names(&names)
    }

    pub fn pairs(&self) -> &[LineagePair] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rank of the deepest pair; `None` for the root.
    pub fn rank(&self) -> Option<Rank> {
        self.0.last().map(|p| p.rank)
    }

    /// Rank label as written in reports, `root` for the empty lineage.
    pub fn rank_label(&self) -> &'static str {
        self.rank().map_or("root", |r| r.as_str())
    }

    pub fn push(&mut self, pair: LineagePair) {
        self.0.push(pair);
    }

    pub fn pop(&mut self) -> Option<LineagePair> {
        self.0.pop()
    }

    /// Drop trailing pairs that carry no name.
    pub fn trim_empty(&mut self) {
        while self.0.last().is_some_and(|p| p.name.is_empty()) {
            self.0.pop();
        }
    }

    pub fn is_prefix_of(&self, other: &Lineage) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    pub fn display(&self) -> String {
        self.0
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl FromIterator<LineagePair> for Lineage {
    fn from_iter<I: IntoIterator<Item = LineagePair>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_order() {
        assert!(Rank::Superkingdom < Rank::Phylum);
        assert!(Rank::Species < Rank::Strain);
        assert_eq!(Rank::Order.up_to(), vec![
            Rank::Superkingdom,
            Rank::Phylum,
            Rank::Class,
            Rank::Order
        ]);
    }

    #[test]
    fn test_rank_from_str() {
        assert_eq!("genus".parse::<Rank>().unwrap(), Rank::Genus);
        assert!("kingdom".parse::<Rank>().is_err());
    }

    #[test]
    fn test_lineage_parse_and_display() {
        let lineage = Lineage::parse("d__Bacteria;p__Firmicutes;;");
        assert_eq!(lineage.pairs().len(), 2);
        assert_eq!(lineage.rank(), Some(Rank::Phylum));
        assert_eq!(lineage.display(), "d__Bacteria;p__Firmicutes");
        assert!(Lineage::parse("").is_empty());
        assert_eq!(Lineage::root().rank_label(), "root");
    }

    #[test]
    fn test_lineage_prefix() {
        let a = Lineage::parse("Bacteria");
        let b = Lineage::parse("Bacteria;Proteobacteria");
        assert!(a.is_prefix_of(&b));
        assert!(!b.is_prefix_of(&a));
        assert!(Lineage::root().is_prefix_of(&a));
    }
}
