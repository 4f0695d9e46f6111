use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use log::{error, info, warn};

use crate::{
    aligner::{coords_path, read_coords, Nucmer},
    contigs::{
        filter_alignments, partition_contigs, removal_exceeds, Contamination, ContigPartition,
        FilterStats, Side,
    },
    error::Error,
    fasta::{read_fasta, write_fasta},
    io::{decompress_into, ensure_dir, find_genome_filename},
    types::OddityRow,
};

#[derive(Debug, Clone)]
pub struct AlignOptions {
    pub percent_threshold: f64,
    pub length_threshold: u64,
    pub removal_multiple: f64,
    pub alignments_dir: PathBuf,
    pub nucmer: Nucmer,
}

/// Outcome of aligning and partitioning one genome pair.
#[derive(Debug, Clone)]
pub struct PairReport {
    pub stats: FilterStats,
    pub removed1: u64,
    pub removed2: u64,
    pub contamination: Contamination,
}

fn ident_of(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Not a file: {:?}", path))
}

fn kb(bp: u64) -> f64 {
    bp as f64 / 1000.0
}

/// Write `<genome>.kept.fa` and `<genome>.removed.fa`, undoing the split
/// first if too much was removed. Returns bp removed and whether the
/// removal was excessive.
fn write_partition(
    ident: &str,
    genome: &Path,
    mut partition: ContigPartition,
    aligned_bp: u64,
    removal_multiple: f64,
) -> anyhow::Result<(u64, bool)> {
    let bp_removed = partition.bp_removed();
    let bp_total = partition.bp_total();
    let percent = if bp_total == 0 {
        0.0
    } else {
        bp_removed as f64 / bp_total as f64 * 100.0
    };
    info!(
        "{}: removed {:.0}kb of {:.0}kb ({:.0}%), {} of {} contigs",
        ident,
        kb(bp_removed),
        kb(bp_total),
        percent,
        partition.contigs_removed(),
        partition.contigs_total()
    );

    let excess = removal_exceeds(bp_removed, aligned_bp, removal_multiple);
    if excess {
        partition.reset();
    }

    let genome = genome.as_os_str().to_string_lossy();
    write_fasta(format!("{}.kept.fa", genome), partition.kept())?;
    write_fasta(format!("{}.removed.fa", genome), partition.removed())?;
    Ok((bp_removed, excess))
}

/// Align `src2` against `src1`, then split each genome's contigs into
/// kept and removed.
pub fn align_pair(
    src1: &Path,
    src2: &Path,
    ident1: &str,
    ident2: &str,
    opts: &AlignOptions,
) -> anyhow::Result<PairReport> {
    ensure_dir(&opts.alignments_dir)?;

    let genome1 = opts.alignments_dir.join(format!("{}.fa", ident1));
    let genome2 = opts.alignments_dir.join(format!("{}.fa", ident2));
    decompress_into(src1, &genome1)?;
    decompress_into(src2, &genome2)?;

    let coords = coords_path(&opts.alignments_dir, ident1, ident2);
    opts.nucmer
        .run_cached(&genome1, &genome2, &coords)
        .with_context(|| format!("Could not align {} and {}", ident1, ident2))?;

    let hits = read_coords(&coords).with_context(|| format!("Could not read {:?}", coords))?;
    let filtered = filter_alignments(hits, opts.length_threshold, opts.percent_threshold);

    let Some(longest) = filtered.longest_kept() else {
        error!("** FLAG: no kept alignments for {}.x.{}", ident1, ident2);
        return Err(Error::NoKeptAlignments(format!("{}.x.{}", ident1, ident2)).into());
    };

    let stats = &filtered.stats;
    info!(
        "{}.x.{}: {:.0}kb aln; longest contig: {:.0} kb",
        ident1,
        ident2,
        kb(stats.aligned_bp),
        kb(longest.hit_length_qry)
    );
    match stats.weighted_identity() {
        Some(identity) => info!("weighted percent identity across alignments: {:.1}%", identity),
        None => info!("weighted percent identity across alignments: no alignments"),
    }
    info!(
        "skipped {:.0} kb of alignments in {} alignments (< {} bp or < {:.0}% identity)",
        kb(stats.skipped_bp),
        stats.skipped_alignments,
        opts.length_threshold,
        opts.percent_threshold
    );

    let records2 = read_fasta(&genome2)?;
    let partition2 = partition_contigs(records2, &filtered.kept, Side::Query);
    let (removed2, excess2) =
        write_partition(ident2, &genome2, partition2, stats.aligned_bp, opts.removal_multiple)?;

    let records1 = read_fasta(&genome1)?;
    let partition1 = partition_contigs(records1, &filtered.kept, Side::Reference);
    let (removed1, excess1) =
        write_partition(ident1, &genome1, partition1, stats.aligned_bp, opts.removal_multiple)?;

    let contamination = Contamination::from_excess(excess1, excess2);
    match contamination {
        Contamination::Both => warn!("** FLAGFLAG, too much removed from both!"),
        Contamination::First => warn!(
            "** FLAG, {} is probably contaminated (too much rm from {})",
            ident1, ident2
        ),
        Contamination::Second => warn!(
            "** FLAG, {} is probably contaminated (too much rm from {})",
            ident2, ident1
        ),
        Contamination::Clean => {}
    }

    Ok(PairReport {
        stats: filtered.stats.clone(),
        removed1,
        removed2,
        contamination,
    })
}

pub fn run_align(genome1: &Path, genome2: &Path, opts: &AlignOptions) -> anyhow::Result<()> {
    let ident1 = ident_of(genome1)?;
    let ident2 = ident_of(genome2)?;
    align_pair(genome1, genome2, &ident1, &ident2, opts)?;
    Ok(())
}

/// `<basename without .csv>.alignments`
pub fn examine_alignments_dir(oddities_csv: &Path) -> anyhow::Result<PathBuf> {
    let name = ident_of(oddities_csv)?;
    let prefix = name.strip_suffix(".csv").unwrap_or(&name);
    Ok(PathBuf::from(format!("{}.alignments", prefix)))
}

fn read_oddity_rows(path: &Path) -> anyhow::Result<Vec<OddityRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    reader
        .deserialize()
        .collect::<Result<Vec<OddityRow>, _>>()
        .with_context(|| format!("Malformed oddities CSV {:?}", path))
}

/// Align every genome pair of an oddity report. Pairs without kept
/// alignments are logged and counted; any other failure is fatal.
pub fn run_examine(
    oddities_csv: &Path,
    genomes_dir: &Path,
    opts: &AlignOptions,
) -> anyhow::Result<()> {
    info!("loading {:?}", oddities_csv);
    info!("getting genomes from: {:?}", genomes_dir);
    info!("length threshold for alignments (bp): {}", opts.length_threshold);
    info!("lower cutoff for identity (%): {}", opts.percent_threshold);
    info!("putting alignments in: {:?}", opts.alignments_dir);

    let rows = read_oddity_rows(oddities_csv)?;
    let mut failed = 0;

    for row in &rows {
        let fn1 = find_genome_filename(genomes_dir, &row.ident1)?;
        let fn2 = find_genome_filename(genomes_dir, &row.ident2)?;

        let lca_name = if row.lca.is_empty() { "(root)" } else { &row.lca };
        info!(
            "cluster {}: {} x {}, {:.0}k {}-mers across {}",
            row.cluster,
            row.ident1,
            row.ident2,
            row.shared_kmers as f64 / 1000.0,
            row.ksize,
            lca_name
        );

        match align_pair(&fn1, &fn2, &row.ident1, &row.ident2, opts) {
            Ok(_) => {}
            Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::NoKeptAlignments(_))) => {
                failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} genome pairs had no kept alignments", failed, rows.len()));
    }
    Ok(())
}
