use std::path::PathBuf;

use thiserror::Error;

/// Failure modes of the database, signature and alignment layers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown taxonomic rank: {0}")]
    UnknownRank(String),

    #[error("Invalid database {path:?}: {reason}")]
    InvalidDatabase { path: PathBuf, reason: String },

    #[error("No sketch in {0:?}")]
    EmptySignature(PathBuf),

    #[error("Incompatible scaled values: cannot downsample {from} to {to}")]
    Downsample { from: u64, to: u64 },

    #[error("Malformed coords line {line}: {reason}")]
    Coords { line: usize, reason: String },

    #[error("Expected exactly one genome matching {pattern}, found {found:?}")]
    AmbiguousGenome { pattern: String, found: Vec<PathBuf> },

    #[error("Aligner failed: {0}")]
    Aligner(String),

    #[error("No alignments passed the thresholds for {0}")]
    NoKeptAlignments(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownRank("kingdom".into());
        assert!(format!("{}", err).contains("kingdom"));

        let err = Error::AmbiguousGenome {
            pattern: "genomes/GCA_1*_genomic.fna.gz".into(),
            found: vec![],
        };
        assert!(format!("{}", err).contains("exactly one genome"));
    }
}
