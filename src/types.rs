use serde::{Deserialize, Serialize};

/// One FASTA record of a genome assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    /// First word of the header.
    pub id: String,
    /// Full header line without the leading `>`.
    pub header: String,
    pub sequence: Vec<u8>,
}

impl Contig {
    pub fn length(&self) -> u64 {
        self.sequence.len() as u64
    }
}

/// One alignment between a reference and a query contig.
///
/// Coordinates are 1-based inclusive as printed by the aligner.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentHit {
    pub ref_name: String,
    pub qry_name: String,
    pub ref_start: u64,
    pub ref_end: u64,
    pub qry_start: u64,
    pub qry_end: u64,
    pub percent_identity: f64,
    pub hit_length_ref: u64,
    pub hit_length_qry: u64,
    pub ref_length: u64,
    pub qry_length: u64,
    pub is_self_hit: bool,
}

/// Row of `<prefix>-bulk-classify.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRow {
    pub rank: String,
    pub name: String,
    pub filename: String,
    pub md5sum: String,
    #[serde(default)]
    pub lineage: String,
}

/// Row of `<prefix>-dig.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct DigRow {
    pub status: String,
    pub name: String,
    pub filename: String,
    pub md5sum: String,
}

/// Row of the oddity report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddityRow {
    pub cluster: usize,
    pub num_lineages: usize,
    pub shared_kmers: u64,
    pub ksize: u32,
    pub rank: String,
    pub lca: String,
    pub ident1: String,
    pub lineage1: String,
    pub ident2: String,
    pub lineage2: String,
}
