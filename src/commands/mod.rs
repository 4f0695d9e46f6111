pub mod align;
pub mod classify;
pub mod dig;
pub mod oddities;
pub mod rankinfo;
pub mod scrub;
pub mod sheets;

use std::path::PathBuf;

use anyhow::Context;
use indicatif::ProgressStyle;
use log::info;

use crate::lcadb::{load_databases, LcaDatabase};

/// Databases plus the ksize and scaled they share.
pub struct Databases {
    pub dblist: Vec<LcaDatabase>,
    pub ksize: u32,
    pub scaled: u64,
}

pub fn load_dbs(paths: &[PathBuf], scaled: Option<u64>) -> anyhow::Result<Databases> {
    let dblist = load_databases(paths, scaled)
        .with_context(|| format!("Failed to load LCA databases: {:?}", paths))?;
    let first = dblist
        .first()
        .context("must specify at least one LCA database")?;
    let (ksize, scaled) = (first.ksize, first.scaled);
    info!("ksize={} scaled={}", ksize, scaled);
    Ok(Databases {
        dblist,
        ksize,
        scaled,
    })
}

pub fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}
