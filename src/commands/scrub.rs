use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use log::{info, warn};

use crate::{io::read_hash_list, lcadb::LcaDatabase};

/// `scrub-<filename>` next to the input database.
pub fn default_output(db: &Path) -> anyhow::Result<PathBuf> {
    let name = db
        .file_name()
        .ok_or_else(|| anyhow!("Not a file: {:?}", db))?
        .to_string_lossy();
    Ok(db.with_file_name(format!("scrub-{}", name)))
}

pub fn run(db_path: &Path, scrublist: &Path, output: Option<&Path>) -> anyhow::Result<PathBuf> {
    let mut db = LcaDatabase::load(db_path)
        .with_context(|| format!("Failed to load LCA database {:?}", db_path))?;

    let hashes = read_hash_list(scrublist)?;
    info!("loaded {} hashvals from scrublist {:?}", hashes.len(), scrublist);

    let removed = db.remove_hashes(&hashes);
    if removed < hashes.len() {
        warn!("{} hashvals were not in the database", hashes.len() - removed);
    }

    let outpath = match output {
        Some(path) => path.to_path_buf(),
        None => default_output(db_path)?,
    };
    info!("saving scrubbed LCA db to {:?}", outpath);
    db.save(&outpath)
        .with_context(|| format!("Could not save {:?}", outpath))?;
    Ok(outpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcadb::tests::write_db;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scrub_run() {
        let dir = TempDir::new().unwrap();
        let db = write_db(dir.path());
        let list = dir.path().join("scrub.txt");
        fs::write(&list, "20\n30\n\n12345\n").unwrap();

        let out = run(&db, &list, None).unwrap();
        assert_eq!(out, dir.path().join("scrub-test.lca.json"));

        let scrubbed = LcaDatabase::load(&out).unwrap();
        let mut keys: Vec<_> = scrubbed.hashval_to_idx.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, vec![10, 40, 50, 18446744073709551000]);
    }
}
