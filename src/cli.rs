use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{lca::ChimeraPolicy, taxonomy::Rank};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    #[arg(short, long, global = true, default_value_t = 1, help = "Num threads")]
    pub threads: usize,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(short, long, global = true, help = "Output debugging output")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Classify signatures against LCA databases
    Classify {
        #[arg(help = "Prefix for output files")]
        prefix: String,

        #[arg(long = "db", num_args(1..), required = true, help = "LCA databases")]
        dbs: Vec<PathBuf>,

        #[arg(long = "query", num_args(1..), required = true, help = "Signature files or directories")]
        queries: Vec<PathBuf>,

        #[arg(short, long, num_args(1..), default_values = vec![".sig", ".sig.gz"], help = "Extensions to look for in directories")]
        extensions: Vec<String>,

        #[arg(long, help = "Downsample databases to this scaled value")]
        scaled: Option<u64>,

        #[arg(long, default_value_t = 5, help = "Minimum hashes supporting an LCA")]
        threshold: u64,

        #[arg(long, value_enum, default_value_t = Rank::Order, help = "Signatures resolved at or below this rank are not saved")]
        filter_rank: Rank,
    },

    /// Sort classifications above the filter rank into chimera/other
    Dig {
        #[arg(help = "Prefix used with classify")]
        prefix: String,

        #[arg(help = "CSV written by classify")]
        classify_csv: PathBuf,

        #[arg(long = "db", num_args(1..), required = true, help = "LCA databases")]
        dbs: Vec<PathBuf>,

        #[arg(long, help = "Downsample databases to this scaled value")]
        scaled: Option<u64>,

        #[arg(long, default_value_t = 5, help = "Minimum hashes supporting an LCA")]
        threshold: u64,

        #[arg(long, value_enum, default_value_t = Rank::Order, help = "Rank to aggregate to")]
        filter_rank: Rank,

        #[arg(long, value_enum, default_value_t = ChimeraPolicy::AtFilterRank, help = "Which buckets count towards a chimera")]
        chimera_policy: ChimeraPolicy,
    },

    /// Count database hashes by the rank of their LCA
    Rankinfo {
        #[arg(long = "db", num_args(1..), required = true, help = "LCA databases")]
        dbs: Vec<PathBuf>,

        #[arg(long, help = "Downsample databases to this scaled value")]
        scaled: Option<u64>,

        #[arg(long, default_value_t = 0, help = "Minimum number of references a hash must be in to be counted")]
        minimum_num: usize,

        #[arg(long, value_enum, default_value_t = Rank::Order, help = "Deepest LCA rank written to the output")]
        max_rank: Rank,

        #[arg(short, long, help = "Write confused hash values here")]
        output: Option<PathBuf>,
    },

    /// Find lineage sets sharing hashes across distant taxa
    Oddities {
        #[arg(long = "db", num_args(1..), required = true, help = "LCA databases")]
        dbs: Vec<PathBuf>,

        #[arg(long, help = "Downsample databases to this scaled value")]
        scaled: Option<u64>,

        #[arg(long, default_value_t = 0, help = "Minimum number of references a hash must be in to be counted")]
        minimum_num: usize,

        #[arg(long, value_enum, default_value_t = Rank::Superkingdom, help = "Deepest LCA rank considered odd")]
        target_rank: Rank,

        #[arg(long, default_value_t = 5, help = "Minimum hashes shared by a lineage set")]
        min_shared: usize,

        #[arg(long, help = "Only report clusters with a reference pair below this similarity")]
        distinct_similarity: Option<f64>,

        #[arg(short, long, default_value = "oddities.csv", help = "CSV report")]
        output: PathBuf,

        #[arg(long, default_value = "confused_hashvals.txt", help = "Hash values of reported clusters")]
        hashes_out: PathBuf,
    },

    /// Remove listed hashes from an LCA database
    Scrub {
        db: PathBuf,

        #[arg(help = "File with one hash value per line")]
        scrublist: PathBuf,

        #[arg(short, long, help = "Output database (default scrub-<db>)")]
        output: Option<PathBuf>,
    },

    /// Copy root/superkingdom signatures from classify runs into one dir
    GrabSigs {
        #[arg(num_args(1..), required = true, help = "Prefixes used with classify")]
        prefixes: Vec<String>,

        #[arg(long, required = true, help = "Directory for signatures")]
        sigdir: PathBuf,
    },

    /// Convert classify CSVs into a lineage spreadsheet
    ToLineages {
        #[arg(num_args(1..), required = true, help = "CSVs written by classify")]
        csvs: Vec<PathBuf>,

        #[arg(short, long, required = true, help = "Lineage spreadsheet to write")]
        output: PathBuf,
    },

    /// Compare two lineage spreadsheets by LCA
    CompareLineages {
        #[arg(help = "Reference lineage spreadsheet")]
        reference: PathBuf,

        #[arg(help = "Lineage spreadsheet to check against the reference")]
        query: PathBuf,

        #[arg(long, default_value_t = 2, help = "1-based first lineage column in the reference")]
        reference_start_column: usize,

        #[arg(long, default_value_t = 2, help = "1-based first lineage column in the query")]
        query_start_column: usize,

        #[arg(long, help = "Write accessions only resolved to superkingdom/phylum here")]
        shallow_out: Option<PathBuf>,
    },

    /// Align two genomes and split their contigs into kept/removed
    Align {
        genome1: PathBuf,

        genome2: PathBuf,

        #[arg(long, default_value_t = 95.0, help = "Lower cutoff for identity (%)")]
        percent_threshold: f64,

        #[arg(long, default_value_t = 0, help = "Length threshold for alignments (bp)")]
        length_threshold: u64,

        #[arg(long, default_value_t = 2.5, help = "Flag when removed bp exceed this multiple of aligned bp")]
        removal_multiple: f64,

        #[arg(long, default_value = "alignments", help = "Directory for alignments")]
        alignments_dir: PathBuf,

        #[arg(long, default_value = "nucmer")]
        nucmer: PathBuf,

        #[arg(long, default_value = "show-coords")]
        show_coords: PathBuf,
    },

    /// Align every genome pair listed in an oddities CSV
    Examine {
        oddities_csv: PathBuf,

        #[arg(help = "Directory of *_genomic.fna.gz genomes")]
        genomes_dir: PathBuf,

        #[arg(long, default_value_t = 95.0, help = "Lower cutoff for identity (%)")]
        percent_threshold: f64,

        #[arg(long, default_value_t = 500, help = "Length threshold for alignments (bp)")]
        length_threshold: u64,

        #[arg(long, default_value_t = 1.5, help = "Flag when removed bp exceed this multiple of aligned bp")]
        removal_multiple: f64,

        #[arg(long, default_value = "nucmer")]
        nucmer: PathBuf,

        #[arg(long, default_value = "show-coords")]
        show_coords: PathBuf,
    },
}

pub fn parse_args() -> Args {
    let mut args = Args::parse();

    if let Command::Classify { extensions, .. } = &mut args.command {
        *extensions = extensions.iter().map(|e| e.to_lowercase()).collect();
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_dig() {
        let args = Args::try_parse_from([
            "taxscrub", "-q", "dig", "run1", "run1-bulk-classify.csv", "--db", "a.json", "b.json",
            "--filter-rank", "phylum", "--chimera-policy", "any-buckets",
        ])
        .unwrap();
        assert!(args.quiet);
        match args.command {
            Command::Dig {
                dbs,
                filter_rank,
                chimera_policy,
                threshold,
                ..
            } => {
                assert_eq!(dbs.len(), 2);
                assert_eq!(filter_rank, Rank::Phylum);
                assert_eq!(chimera_policy, ChimeraPolicy::AnyBuckets);
                assert_eq!(threshold, 5);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
