mod aligner;
mod cli;
mod commands;
mod compare;
mod contigs;
mod error;
mod fasta;
mod io;
mod lca;
mod lcadb;
mod oddities;
mod output;
mod signature;
mod taxonomy;
mod types;

use anyhow::Context;
use env_logger::Env;

use aligner::Nucmer;
use cli::{parse_args, Command};
use commands::{
    align::{examine_alignments_dir, run_align, run_examine, AlignOptions},
    classify, dig,
    oddities::{self as odd, OdditiesOptions},
    rankinfo, scrub, sheets,
};

fn main() -> anyhow::Result<()> {
    let args = parse_args();

    let level = if args.quiet {
        "error"
    } else if args.debug {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .context("Failed to build thread pool")?;

    match args.command {
        Command::Classify {
            prefix,
            dbs,
            queries,
            extensions,
            scaled,
            threshold,
            filter_rank,
        } => classify::run(&prefix, &dbs, &queries, &extensions, scaled, threshold, filter_rank),

        Command::Dig {
            prefix,
            classify_csv,
            dbs,
            scaled,
            threshold,
            filter_rank,
            chimera_policy,
        } => dig::run(
            &prefix,
            &classify_csv,
            &dbs,
            scaled,
            threshold,
            filter_rank,
            chimera_policy,
        ),

        Command::Rankinfo {
            dbs,
            scaled,
            minimum_num,
            max_rank,
            output,
        } => rankinfo::run(&dbs, scaled, minimum_num, max_rank, output.as_deref()).map(|_| ()),

        Command::Oddities {
            dbs,
            scaled,
            minimum_num,
            target_rank,
            min_shared,
            distinct_similarity,
            output,
            hashes_out,
        } => {
            let opts = OdditiesOptions {
                minimum_num,
                target_rank,
                min_shared,
                distinct_similarity,
                output: &output,
                hashes_out: &hashes_out,
            };
            odd::run(&dbs, scaled, &opts).map(|_| ())
        }

        Command::Scrub {
            db,
            scrublist,
            output,
        } => scrub::run(&db, &scrublist, output.as_deref()).map(|_| ()),

        Command::GrabSigs { prefixes, sigdir } => {
            sheets::grab_sigs(&prefixes, &sigdir).map(|_| ())
        }

        Command::ToLineages { csvs, output } => sheets::to_lineages(&csvs, &output).map(|_| ()),

        Command::CompareLineages {
            reference,
            query,
            reference_start_column,
            query_start_column,
            shallow_out,
        } => sheets::compare_lineages(
            &reference,
            &query,
            reference_start_column,
            query_start_column,
            shallow_out.as_deref(),
        )
        .map(|_| ()),

        Command::Align {
            genome1,
            genome2,
            percent_threshold,
            length_threshold,
            removal_multiple,
            alignments_dir,
            nucmer,
            show_coords,
        } => {
            let opts = AlignOptions {
                percent_threshold,
                length_threshold,
                removal_multiple,
                alignments_dir,
                nucmer: Nucmer {
                    nucmer_bin: nucmer,
                    show_coords_bin: show_coords,
                },
            };
            run_align(&genome1, &genome2, &opts)
        }

        Command::Examine {
            oddities_csv,
            genomes_dir,
            percent_threshold,
            length_threshold,
            removal_multiple,
            nucmer,
            show_coords,
        } => {
            let opts = AlignOptions {
                percent_threshold,
                length_threshold,
                removal_multiple,
                alignments_dir: examine_alignments_dir(&oddities_csv)?,
                nucmer: Nucmer {
                    nucmer_bin: nucmer,
                    show_coords_bin: show_coords,
                },
            };
            run_examine(&oddities_csv, &genomes_dir, &opts)
        }
    }
}
