use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use indicatif::ProgressBar;
use log::{debug, info, warn};

use super::{load_dbs, progress_style};
use crate::{
    io::{collect_files, ensure_dir},
    lca::{classify_counts, count_lca_for_assignments, ClassifyStatus},
    lcadb::{gather_assignments, LcaDatabase},
    signature::{load_signatures, save_signatures, Signature, Sketch},
    taxonomy::{Lineage, Rank},
    types::ClassifyRow,
};

pub fn unclassified_dir(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}-unclassified-sigs", prefix))
}

pub fn classify_csv(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}-bulk-classify.csv", prefix))
}

/// Rank column for a classification: the lineage's rank, `root` when the
/// hashes disagree at the top, `MISSED` when nothing was classified.
pub fn rank_column(lineage: &Lineage, status: ClassifyStatus) -> String {
    match status {
        ClassifyStatus::NoMatch => "MISSED".to_string(),
        _ => lineage.rank_label().to_string(),
    }
}

/// Whether a classify row is resolved at or below `filter_rank`.
pub fn is_resolved(rank: &str, filter_rank: Rank) -> bool {
    rank.parse::<Rank>().map_or(false, |r| r >= filter_rank)
}

pub fn classify_sketch(
    sketch: &Sketch,
    dblist: &[LcaDatabase],
    scaled: u64,
    threshold: u64,
) -> anyhow::Result<(Lineage, ClassifyStatus)> {
    let hashes = sketch.downsample_scaled(scaled)?;
    let gathered = gather_assignments(hashes, dblist);
    if gathered.unassigned > 0 {
        debug!("{} hashes without a lineage", gathered.unassigned);
    }
    let counts = count_lca_for_assignments(&gathered.assignments);
    Ok(classify_counts(&counts, threshold))
}

fn save_unclassified(dir: &Path, sig: &Signature, md5sum: &str) -> anyhow::Result<()> {
    let path = dir.join(format!("{}.sig", md5sum));
    save_signatures(&path, &[sig]).with_context(|| format!("Could not save {:?}", path))
}

pub fn run(
    prefix: &str,
    dbs: &[PathBuf],
    queries: &[PathBuf],
    extensions: &[String],
    scaled: Option<u64>,
    threshold: u64,
    filter_rank: Rank,
) -> anyhow::Result<()> {
    let dbs = load_dbs(dbs, scaled)?;

    let dirname = unclassified_dir(prefix);
    info!("making output sigs dir: {:?}", dirname);
    if dirname.exists() {
        warn!("{:?} already exists.", dirname);
    }
    ensure_dir(&dirname)?;

    let files = collect_files(queries, extensions)?;
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(progress_style());
    pb.set_message("Classifying signatures...");

    let outpath = classify_csv(prefix);
    let mut writer = csv::Writer::from_path(&outpath)
        .with_context(|| format!("Could not create file: {:?}", outpath))?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut n = 0;
    let mut n_missed = 0;

    for path in &files {
        let sigs = load_signatures(path).with_context(|| format!("Failed to load {:?}", path))?;

        for sig in &sigs {
            let Some(sketch) = sig.sketch(Some(dbs.ksize)) else {
                warn!("{:?}: no sketch at k={}, skipping {}", path, dbs.ksize, sig.name);
                continue;
            };

            let (lineage, status) = classify_sketch(sketch, &dbs.dblist, dbs.scaled, threshold)
                .with_context(|| format!("Could not classify {:?}", path))?;

            let rank = rank_column(&lineage, status);
            if status == ClassifyStatus::NoMatch {
                n_missed += 1;
            } else {
                *counts.entry(rank.clone()).or_insert(0) += 1;
            }

            if !is_resolved(&rank, filter_rank) {
                save_unclassified(&dirname, sig, &sketch.md5sum)?;
            }

            writer.serialize(ClassifyRow {
                rank,
                name: sig.name.clone(),
                filename: sig.filename.clone(),
                md5sum: sketch.md5sum.clone(),
                lineage: lineage.display(),
            })?;

            n += 1;
            if n % 1000 == 0 {
                writer.flush()?;
                info!("at {} genomes... {:?}; missed: {}", n, counts, n_missed);
            }
        }
        pb.inc(1);
    }

    writer.flush()?;
    pb.finish_and_clear();

    info!("{:?}", counts);
    info!("missed: {} of {}", n_missed, n);
    Ok(())
}
