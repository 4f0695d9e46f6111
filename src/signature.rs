//! Read-only view of sourmash signature files.
//!
//! Only the pieces the LCA drivers need are typed: name, filename, and per
//! sketch the k-mer size, `max_hash`, hash list and md5 identifier. The
//! original JSON is kept so a signature can be written back untouched.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{Error, Result},
    io::{create_writer, open_reader},
};

/// Largest hash retained at a given scaled factor.
pub fn max_hash_for_scaled(scaled: u64) -> u64 {
    if scaled <= 1 {
        return u64::MAX;
    }
    let scaled = scaled as u128;
    let max_hash = ((1u128 << 64) + scaled / 2) / scaled;
    max_hash.min(u64::MAX as u128) as u64
}

/// Inverse of [`max_hash_for_scaled`]; `None` for unscaled sketches.
pub fn scaled_for_max_hash(max_hash: u64) -> Option<u64> {
    if max_hash == 0 {
        return None;
    }
    let max_hash = max_hash as u128;
    Some((((1u128 << 64) + max_hash / 2) / max_hash) as u64)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sketch {
    pub ksize: u32,
    #[serde(default)]
    pub max_hash: u64,
    #[serde(default)]
    pub mins: Vec<u64>,
    pub md5sum: String,
}

impl Sketch {
    pub fn scaled(&self) -> Option<u64> {
        scaled_for_max_hash(self.max_hash)
    }

    /// Hashes this sketch would hold at a coarser `scaled`.
    pub fn downsample_scaled(&self, scaled: u64) -> Result<Vec<u64>> {
        let current = self.scaled().unwrap_or(1);
        if scaled < current {
            return Err(Error::Downsample {
                from: current,
                to: scaled,
            });
        }
        let max_hash = max_hash_for_scaled(scaled);
        Ok(self.mins.iter().copied().filter(|h| *h <= max_hash).collect())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SignatureFields {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    signatures: Vec<Sketch>,
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub filename: String,
    pub sketches: Vec<Sketch>,
    pub path: PathBuf,
    raw: Value,
}

impl Signature {
    fn from_value(raw: Value, path: &Path) -> Result<Self> {
        let fields: SignatureFields =
            serde_json::from_value(raw.clone()).map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let filename = fields.filename.unwrap_or_default();
        let name = match fields.name {
            Some(name) if !name.is_empty() => name,
            _ => filename.clone(),
        };
        Ok(Self {
            name,
            filename,
            sketches: fields.signatures,
            path: path.to_path_buf(),
            raw,
        })
    }

    /// The sketch at `ksize`, or the first one when no ksize is requested.
    pub fn sketch(&self, ksize: Option<u32>) -> Option<&Sketch> {
        match ksize {
            Some(k) => self.sketches.iter().find(|s| s.ksize == k),
            None => self.sketches.first(),
        }
    }
}

/// Every signature record in a file (a JSON list or a single object).
pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<Vec<Signature>> {
    let path = path.as_ref();
    let reader = open_reader(path)?;
    let value: Value = serde_json::from_reader(reader).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let records = match value {
        Value::Array(records) => records,
        other => vec![other],
    };
    let sigs = records
        .into_iter()
        .map(|raw| Signature::from_value(raw, path))
        .collect::<Result<Vec<_>>>()?;

    if sigs.is_empty() {
        return Err(Error::EmptySignature(path.to_path_buf()));
    }
    Ok(sigs)
}

/// The single sketch at `ksize` in a signature file.
pub fn load_one_sketch<P: AsRef<Path>>(path: P, ksize: Option<u32>) -> Result<(Signature, Sketch)> {
    let path = path.as_ref();
    for sig in load_signatures(path)? {
        if let Some(sketch) = sig.sketch(ksize).cloned() {
            return Ok((sig, sketch));
        }
    }
    Err(Error::EmptySignature(path.to_path_buf()))
}

pub fn save_signatures<P: AsRef<Path>>(path: P, sigs: &[&Signature]) -> Result<()> {
    let path = path.as_ref();
    let records: Vec<&Value> = sigs.iter().map(|s| &s.raw).collect();
    let mut writer = create_writer(path)?;
    serde_json::to_writer(&mut writer, &records).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) fn signature_json(name: &str, md5: &str, mins: &[u64]) -> String {
        format!(
            r#"[{{"class": "sourmash_signature", "name": "{}", "filename": "{}.fna.gz",
                "signatures": [{{"ksize": 31, "max_hash": {}, "mins": {:?}, "md5sum": "{}"}}],
                "version": 0.4}}]"#,
            name,
            name,
            max_hash_for_scaled(1000),
            mins,
            md5
        )
    }

    #[test]
    fn test_scaled_conversions() {
        assert_eq!(max_hash_for_scaled(1), u64::MAX);
        assert_eq!(max_hash_for_scaled(1000), 18446744073709552);
        assert_eq!(scaled_for_max_hash(max_hash_for_scaled(1000)), Some(1000));
        assert_eq!(scaled_for_max_hash(0), None);
    }

    #[test]
    fn test_load_and_downsample() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("g.sig");
        let big = max_hash_for_scaled(2000) + 5;
        fs::write(&path, signature_json("genome A", "abc123", &[10, 20, big])).unwrap();

        let (sig, sketch) = load_one_sketch(&path, Some(31)).unwrap();
        assert_eq!(sig.name, "genome A");
        assert_eq!(sketch.md5sum, "abc123");
        assert_eq!(sketch.scaled(), Some(1000));
        assert_eq!(sketch.downsample_scaled(1000).unwrap().len(), 3);
        assert_eq!(sketch.downsample_scaled(2000).unwrap(), vec![10, 20]);
        assert!(sketch.downsample_scaled(100).is_err());
        assert!(load_one_sketch(&path, Some(21)).is_err());
    }

    #[test]
    fn test_save_signature_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("g.sig");
        fs::write(&path, signature_json("genome A", "abc123", &[1, 2])).unwrap();
        let sigs = load_signatures(&path).unwrap();

        let out = dir.path().join("copy.sig");
        save_signatures(&out, &[&sigs[0]]).unwrap();
        let copy = load_signatures(&out).unwrap();
        assert_eq!(copy[0].name, "genome A");
        assert_eq!(copy[0].sketches[0].mins, vec![1, 2]);
    }
}
