use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;

use super::{
    classify::{is_resolved, unclassified_dir},
    load_dbs,
};
use crate::{
    lca::{
        aggregate_to_level, call_chimera, count_lca_for_assignments, sorted_counts,
        ChimeraCall, ChimeraPolicy, LineageCounts, Verdict,
    },
    lcadb::{gather_assignments, LcaDatabase},
    output::{write_csv, write_lineage_counts},
    signature::load_one_sketch,
    taxonomy::Rank,
    types::{ClassifyRow, DigRow},
};

/// Aggregated buckets and the chimera call for one signature's hashes.
pub fn dig_hashes(
    hashes: Vec<u64>,
    dblist: &[LcaDatabase],
    threshold: u64,
    filter_rank: Rank,
    policy: ChimeraPolicy,
) -> (LineageCounts, ChimeraCall) {
    let gathered = gather_assignments(hashes, dblist);
    let counts = count_lca_for_assignments(&gathered.assignments);
    let buckets = aggregate_to_level(&sorted_counts(&counts), &filter_rank.up_to(), threshold);
    let call = call_chimera(&buckets, policy, filter_rank);
    (buckets, call)
}

fn read_classify_rows(path: &Path) -> anyhow::Result<Vec<ClassifyRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    reader
        .deserialize()
        .collect::<Result<Vec<ClassifyRow>, _>>()
        .with_context(|| format!("Malformed classify CSV {:?}", path))
}

pub fn run(
    prefix: &str,
    classify_csv: &Path,
    dbs: &[PathBuf],
    scaled: Option<u64>,
    threshold: u64,
    filter_rank: Rank,
    policy: ChimeraPolicy,
) -> anyhow::Result<()> {
    let dbs = load_dbs(dbs, scaled)?;

    let dirname = unclassified_dir(prefix);
    let infodir = PathBuf::from(format!("{}-unclassified-sigs-chimera.info", prefix));
    crate::io::ensure_dir(&infodir)?;

    let mut out = Vec::new();
    let (mut n_chimera, mut n_other) = (0, 0);

    for row in read_classify_rows(classify_csv)? {
        if row.rank == "MISSED" || is_resolved(&row.rank, filter_rank) {
            continue;
        }

        let sigpath = dirname.join(format!("{}.sig", row.md5sum));
        let (_, sketch) = load_one_sketch(&sigpath, Some(dbs.ksize))
            .with_context(|| format!("Failed to load {:?}", sigpath))?;
        let hashes = sketch.downsample_scaled(dbs.scaled)?;

        let (buckets, call) = dig_hashes(hashes, &dbs.dblist, threshold, filter_rank, policy);

        if call.verdict == Verdict::Chimera {
            info!("{}", row.name);
            for lineage in &call.lineages {
                info!("    {}", lineage);
            }

            let detail: Vec<_> = call
                .lineages
                .iter()
                .map(|l| (l.clone(), buckets.get(l).copied().unwrap_or(0)))
                .collect();
            write_lineage_counts(infodir.join(format!("{}.txt", row.md5sum)), &detail)?;
            n_chimera += 1;
        } else {
            n_other += 1;
        }

        out.push(DigRow {
            status: call.verdict.as_str().to_string(),
            name: row.name,
            filename: row.filename,
            md5sum: row.md5sum,
        });
    }

    write_csv(format!("{}-dig.csv", prefix), &out)?;
    info!("{} chimera, {} other", n_chimera, n_other);
    Ok(())
}
