use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use log::info;

use super::load_dbs;
use crate::{
    lcadb::gather_all_assignments,
    oddities::{cluster_entries, mixed_clusters, oddity_rows, SketchIndex},
    output::{write_csv, write_hash_list},
    taxonomy::Rank,
};

pub struct OdditiesOptions<'a> {
    pub minimum_num: usize,
    pub target_rank: Rank,
    pub min_shared: usize,
    pub distinct_similarity: Option<f64>,
    pub output: &'a Path,
    pub hashes_out: &'a Path,
}

/// Report mixed lineage-set clusters; returns how many were reported.
pub fn run(dbs: &[PathBuf], scaled: Option<u64>, opts: &OdditiesOptions) -> anyhow::Result<usize> {
    let dbs = load_dbs(dbs, scaled)?;

    let gathered = gather_all_assignments(&dbs.dblist, opts.minimum_num);
    let clusters = mixed_clusters(&gathered.assignments, opts.target_rank, opts.min_shared);
    info!("{} candidate clusters", clusters.len());

    let mut index = SketchIndex::new(&dbs.dblist);
    let mut rows = Vec::new();
    let mut confused = BTreeSet::new();
    let mut n_reported = 0;

    for (n, cluster) in clusters.iter().enumerate() {
        let entries = cluster_entries(cluster, &dbs.dblist);

        if let Some(threshold) = opts.distinct_similarity {
            if !index.has_distinct_pair(&entries, threshold) {
                continue;
            }
        }

        info!(
            "cluster {} has {} assignments for {} hashvals / {} bp",
            n,
            cluster.lineages.len(),
            cluster.hashes.len(),
            dbs.scaled * cluster.hashes.len() as u64
        );
        for lineage in &cluster.lineages {
            info!("*  {}", lineage);
            for entry in entries.iter().filter(|e| &e.lineage == lineage) {
                info!("   {}", entry.ident);
            }
        }

        rows.extend(oddity_rows(n, cluster, &entries, dbs.scaled, dbs.ksize));
        confused.extend(cluster.hashes.iter().copied());
        n_reported += 1;
    }

    write_csv(opts.output, &rows)?;
    let n_hashes = write_hash_list(opts.hashes_out, &confused)?;
    info!(
        "{} clusters, {} rows written to {:?}; {} hashvals to {:?}",
        n_reported,
        rows.len(),
        opts.output,
        n_hashes,
        opts.hashes_out
    );
    Ok(n_reported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{io::read_hash_list, lcadb::tests::write_db, types::OddityRow};
    use tempfile::TempDir;

    #[test]
    fn test_oddities_run() {
        let dir = TempDir::new().unwrap();
        let db = write_db(dir.path());
        let output = dir.path().join("oddities.csv");
        let hashes_out = dir.path().join("confused.txt");

        let opts = OdditiesOptions {
            minimum_num: 0,
            target_rank: Rank::Superkingdom,
            min_shared: 1,
            distinct_similarity: None,
            output: &output,
            hashes_out: &hashes_out,
        };
        assert_eq!(run(&[db.clone()], None, &opts).unwrap(), 2);

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let rows: Vec<OddityRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.ksize == 31 && r.shared_kmers == 1000));
        assert_eq!(read_hash_list(&hashes_out).unwrap(), BTreeSet::from([20, 30]));

        // each reference pair shares one hash, jaccard >= 0.25
        let strict = OdditiesOptions {
            distinct_similarity: Some(0.2),
            ..opts
        };
        assert_eq!(run(&[db], None, &strict).unwrap(), 0);
    }
}
