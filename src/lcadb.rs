//! Reference LCA databases in sourmash's JSON layout.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    io::{create_writer, open_reader},
    lca::HashAssignments,
    signature::max_hash_for_scaled,
    taxonomy::{Lineage, LineagePair, Rank},
};

// Keys stay strings here: integer keys do not survive `flatten`.
#[derive(Deserialize, Serialize)]
struct RawDatabase {
    ksize: u32,
    scaled: u64,
    idx_to_lid: BTreeMap<String, u32>,
    lid_to_lineage: BTreeMap<String, Vec<(String, String)>>,
    hashval_to_idx: BTreeMap<String, Vec<u32>>,
    idx_to_ident: BTreeMap<String, String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Hash -> reference index -> lineage lookup tables.
#[derive(Debug, Clone)]
pub struct LcaDatabase {
    pub path: PathBuf,
    pub ksize: u32,
    pub scaled: u64,
    pub hashval_to_idx: BTreeMap<u64, Vec<u32>>,
    pub idx_to_lid: BTreeMap<u32, u32>,
    pub lid_to_lineage: BTreeMap<u32, Lineage>,
    pub idx_to_ident: BTreeMap<u32, String>,
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Per-hash lineage sets plus the hashes that had no usable lineage.
#[derive(Debug, Default)]
pub struct Gathered {
    pub assignments: HashAssignments,
    pub unassigned: usize,
}

fn lineage_from_pairs(pairs: &[(String, String)]) -> Result<Lineage> {
    let mut by_rank = HashMap::new();
    for (rank, name) in pairs {
        by_rank.insert(rank.parse::<Rank>()?, name.as_str());
    }
    let mut lineage: Lineage = Rank::ALL
        .iter()
        .map(|rank| LineagePair::new(*rank, by_rank.get(rank).copied().unwrap_or("")))
        .collect();
    lineage.trim_empty();
    Ok(lineage)
}

fn parse_keys<K, V>(path: &Path, field: &str, map: BTreeMap<String, V>) -> Result<BTreeMap<K, V>>
where
    K: FromStr + Ord,
{
    map.into_iter()
        .map(|(key, value)| match key.parse::<K>() {
            Ok(k) => Ok((k, value)),
            Err(_) => Err(Error::InvalidDatabase {
                path: path.to_path_buf(),
                reason: format!("bad key {:?} in {}", key, field),
            }),
        })
        .collect()
}

fn string_keys<K: ToString, V: Clone>(map: &BTreeMap<K, V>) -> BTreeMap<String, V> {
    map.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn lineage_to_pairs(lineage: &Lineage) -> Vec<(String, String)> {
    lineage
        .pairs()
        .iter()
        .map(|p| (p.rank.to_string(), p.name.clone()))
        .collect()
}

impl LcaDatabase {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_reader(path)?;
        let raw: RawDatabase = serde_json::from_reader(reader).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;

        if raw.scaled == 0 {
            return Err(Error::InvalidDatabase {
                path: path.to_path_buf(),
                reason: "scaled must be non-zero".into(),
            });
        }

        let lid_to_lineage = parse_keys::<u32, _>(path, "lid_to_lineage", raw.lid_to_lineage)?
            .into_iter()
            .map(|(lid, pairs)| lineage_from_pairs(&pairs).map(|lineage| (lid, lineage)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let hashval_to_idx = parse_keys(path, "hashval_to_idx", raw.hashval_to_idx)?;
        let idx_to_lid = parse_keys(path, "idx_to_lid", raw.idx_to_lid)?;
        let idx_to_ident = parse_keys(path, "idx_to_ident", raw.idx_to_ident)?;

        debug!(
            "{:?}: {} hashes, {} references, {} lineages",
            path,
            hashval_to_idx.len(),
            idx_to_ident.len(),
            lid_to_lineage.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            ksize: raw.ksize,
            scaled: raw.scaled,
            hashval_to_idx,
            idx_to_lid,
            lid_to_lineage,
            idx_to_ident,
            extra: raw.extra,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let raw = RawDatabase {
            ksize: self.ksize,
            scaled: self.scaled,
            idx_to_lid: string_keys(&self.idx_to_lid),
            lid_to_lineage: self
                .lid_to_lineage
                .iter()
                .map(|(lid, lineage)| (lid.to_string(), lineage_to_pairs(lineage)))
                .collect(),
            hashval_to_idx: string_keys(&self.hashval_to_idx),
            idx_to_ident: string_keys(&self.idx_to_ident),
            extra: self.extra.clone(),
        };

        let mut writer = create_writer(path)?;
        serde_json::to_writer(&mut writer, &raw).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.finish()?;
        Ok(())
    }

    /// Drop hashes that a coarser `scaled` would not retain.
    pub fn downsample_scaled(&mut self, scaled: u64) -> Result<()> {
        if scaled < self.scaled {
            return Err(Error::Downsample {
                from: self.scaled,
                to: scaled,
            });
        }
        if scaled == self.scaled {
            return Ok(());
        }
        let max_hash = max_hash_for_scaled(scaled);
        self.hashval_to_idx.retain(|hashval, _| *hashval <= max_hash);
        self.scaled = scaled;
        Ok(())
    }

    pub fn lineage_for_idx(&self, idx: u32) -> Option<&Lineage> {
        self.idx_to_lid
            .get(&idx)
            .and_then(|lid| self.lid_to_lineage.get(lid))
    }

    /// Invert the hash index: reference index -> its hashes.
    pub fn hashes_by_idx(&self) -> HashMap<u32, HashSet<u64>> {
        let mut by_idx: HashMap<u32, HashSet<u64>> = HashMap::new();
        for (hashval, idxs) in &self.hashval_to_idx {
            for idx in idxs {
                by_idx.entry(*idx).or_default().insert(*hashval);
            }
        }
        by_idx
    }

    /// Delete hash entries; returns how many were present.
    pub fn remove_hashes<'a, I>(&mut self, hashes: I) -> usize
    where
        I: IntoIterator<Item = &'a u64>,
    {
        hashes
            .into_iter()
            .filter(|hashval| self.hashval_to_idx.remove(*hashval).is_some())
            .count()
    }
}

/// Load several databases that must agree on ksize and scaled.
///
/// With `scaled` given, every database is downsampled to it.
pub fn load_databases(paths: &[PathBuf], scaled: Option<u64>) -> Result<Vec<LcaDatabase>> {
    let mut dblist = Vec::with_capacity(paths.len());
    for path in paths {
        info!("loading LCA database {:?}", path);
        let mut db = LcaDatabase::load(path)?;
        if let Some(scaled) = scaled {
            db.downsample_scaled(scaled)?;
        }
        dblist.push(db);
    }

    if let Some(first) = dblist.first() {
        for db in &dblist[1..] {
            if db.ksize != first.ksize || db.scaled != first.scaled {
                return Err(Error::InvalidDatabase {
                    path: db.path.clone(),
                    reason: format!(
                        "ksize/scaled {}/{} differ from {}/{} in {:?}",
                        db.ksize, db.scaled, first.ksize, first.scaled, first.path
                    ),
                });
            }
        }
    }
    Ok(dblist)
}

fn assign(gathered: &mut Gathered, db: &LcaDatabase, hashval: u64, idxs: &[u32]) {
    for lineage in idxs.iter().filter_map(|idx| db.lineage_for_idx(*idx)) {
        gathered
            .assignments
            .entry(hashval)
            .or_default()
            .insert(lineage.clone());
    }
}

impl Gathered {
    /// Count the seen hashes that no database gave a lineage for.
    fn count_unassigned(&mut self, seen: &HashSet<u64>) {
        self.unassigned = seen
            .iter()
            .filter(|hashval| !self.assignments.contains_key(*hashval))
            .count();
    }
}

/// Lineages asserted for each of `hashes` across all databases.
pub fn gather_assignments<I>(hashes: I, dblist: &[LcaDatabase]) -> Gathered
where
    I: IntoIterator<Item = u64>,
{
    let mut gathered = Gathered::default();
    let mut seen = HashSet::new();
    for hashval in hashes {
        for db in dblist {
            if let Some(idxs) = db.hashval_to_idx.get(&hashval) {
                seen.insert(hashval);
                assign(&mut gathered, db, hashval, idxs);
            }
        }
    }
    gathered.count_unassigned(&seen);
    gathered
}

/// Lineages for every hash in the databases, skipping hashes found in
/// fewer than `min_num` references.
pub fn gather_all_assignments(dblist: &[LcaDatabase], min_num: usize) -> Gathered {
    let mut gathered = Gathered::default();
    let mut seen = HashSet::new();
    for db in dblist {
        for (hashval, idxs) in &db.hashval_to_idx {
            if min_num > 0 && idxs.len() < min_num {
                continue;
            }
            seen.insert(*hashval);
            assign(&mut gathered, db, *hashval, idxs);
        }
    }
    gathered.count_unassigned(&seen);
    gathered
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) const DB_JSON: &str = r#"{
        "version": "2.1",
        "type": "sourmash_lca",
        "license": "CC0",
        "ksize": 31,
        "scaled": 1000,
        "idx_to_lid": {"0": 1, "1": 2, "2": 3},
        "lid_to_lineage": {
            "1": [["superkingdom", "Bacteria"], ["phylum", "Proteobacteria"], ["class", ""]],
            "2": [["superkingdom", "Bacteria"], ["phylum", "Firmicutes"]],
            "3": [["superkingdom", "Archaea"], ["phylum", "Euryarchaeota"]]
        },
        "hashval_to_idx": {"10": [0], "20": [0, 1], "30": [1, 2], "40": [5], "50": [2],
                           "18446744073709551000": [2]},
        "idx_to_ident": {"0": "GCA_0001", "1": "GCA_0002", "2": "GCA_0003"}
    }"#;

    pub(crate) fn write_db(dir: &Path) -> PathBuf {
        let path = dir.join("test.lca.json");
        fs::write(&path, DB_JSON).unwrap();
        path
    }

    #[test]
    fn test_load_database() {
        let dir = TempDir::new().unwrap();
        let db = LcaDatabase::load(write_db(dir.path())).unwrap();
        assert_eq!(db.ksize, 31);
        assert_eq!(db.scaled, 1000);
        assert_eq!(db.hashval_to_idx.len(), 6);

        let lineage = db.lineage_for_idx(0).unwrap();
        assert_eq!(lineage.display(), "Bacteria;Proteobacteria");
        assert!(db.lineage_for_idx(5).is_none());
        assert_eq!(db.idx_to_ident[&0], "GCA_0001");
    }

    #[test]
    fn test_malformed_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.lca.json");
        fs::write(&path, "{\"ksize\": 31").unwrap();
        assert!(matches!(LcaDatabase::load(&path), Err(Error::Json { .. })));
    }

    #[test]
    fn test_gather_assignments() {
        let dir = TempDir::new().unwrap();
        let dblist = load_databases(&[write_db(dir.path())], None).unwrap();

        let gathered = gather_assignments([10, 20, 40, 99], &dblist);
        assert_eq!(gathered.assignments.len(), 2);
        assert_eq!(gathered.assignments[&20].len(), 2);
        assert_eq!(gathered.unassigned, 1);

        let all = gather_all_assignments(&dblist, 2);
        let mut keys: Vec<_> = all.assignments.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, vec![20, 30]);
    }

    #[test]
    fn test_unassigned_counts_hashes_not_databases() {
        let dir = TempDir::new().unwrap();
        let first = write_db(dir.path());
        // hash 10 points at a reference without a lineage in the second db
        let second = dir.path().join("second.lca.json");
        fs::write(&second, DB_JSON.replace(r#""10": [0]"#, r#""10": [7]"#)).unwrap();
        let dblist = load_databases(&[first, second], None).unwrap();

        let gathered = gather_assignments([10, 40], &dblist);
        assert_eq!(gathered.assignments.len(), 1);
        assert!(gathered.assignments.contains_key(&10));
        assert_eq!(gathered.unassigned, 1);

        let all = gather_all_assignments(&dblist, 0);
        assert!(all.assignments.contains_key(&10));
        assert_eq!(all.unassigned, 1);
    }

    #[test]
    fn test_scrub_and_save() {
        let dir = TempDir::new().unwrap();
        let mut db = LcaDatabase::load(write_db(dir.path())).unwrap();
        assert_eq!(db.remove_hashes(&[10, 77]), 1);

        let out = dir.path().join("scrubbed.lca.json.gz");
        db.save(&out).unwrap();
        let reloaded = LcaDatabase::load(&out).unwrap();
        assert_eq!(reloaded.hashval_to_idx.len(), 5);
        assert!(!reloaded.hashval_to_idx.contains_key(&10));
        assert_eq!(reloaded.lid_to_lineage, db.lid_to_lineage);
        assert_eq!(reloaded.extra.get("type").and_then(|v| v.as_str()), Some("sourmash_lca"));
    }

    #[test]
    fn test_downsample() {
        let dir = TempDir::new().unwrap();
        let mut db = LcaDatabase::load(write_db(dir.path())).unwrap();
        assert!(db.downsample_scaled(10).is_err());
        db.downsample_scaled(2000).unwrap();
        assert_eq!(db.scaled, 2000);
        assert!(!db.hashval_to_idx.contains_key(&18446744073709551000));
    }
}
