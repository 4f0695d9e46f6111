use std::path::{Path, PathBuf};

use log::info;

use super::load_dbs;
use crate::{
    lcadb::gather_all_assignments,
    oddities::{confused_hashes, rank_buckets, RankBuckets},
    output::write_hash_list,
    taxonomy::Rank,
};

fn rank_name(rank: Option<Rank>) -> &'static str {
    rank.map_or("root", |r| r.as_str())
}

pub fn run(
    dbs: &[PathBuf],
    scaled: Option<u64>,
    minimum_num: usize,
    max_rank: Rank,
    output: Option<&Path>,
) -> anyhow::Result<RankBuckets> {
    let dbs = load_dbs(dbs, scaled)?;

    let gathered = gather_all_assignments(&dbs.dblist, minimum_num);
    if gathered.unassigned > 0 {
        info!("{} hashes without a lineage", gathered.unassigned);
    }

    let buckets = rank_buckets(&gathered.assignments);
    for (rank, hashes) in &buckets {
        info!("{} {}", rank_name(*rank), hashes.len());
    }

    let total: usize = buckets.values().map(|h| h.len()).sum();
    if let Some(output) = output {
        let confused = confused_hashes(&buckets, max_rank);
        let n = write_hash_list(output, &confused)?;
        info!("wrote {} confused hashvals, of {} total", n, total);
    }
    Ok(buckets)
}
