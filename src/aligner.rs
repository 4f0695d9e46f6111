//! Wrapper around MUMmer's `nucmer` + `show-coords`.
//!
//! The coords file is the cache: if it already exists for a genome pair the
//! aligner is not run again.

use std::{
    fs::{self, File},
    io::BufRead,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::{debug, info};

use crate::{
    error::{Error, Result},
    io::open_reader,
    types::AlignmentHit,
};

#[derive(Debug, Clone)]
pub struct Nucmer {
    pub nucmer_bin: PathBuf,
    pub show_coords_bin: PathBuf,
}

/// `<alignments_dir>/<ident1>.x.<ident2>`
pub fn coords_path(alignments_dir: &Path, ident1: &str, ident2: &str) -> PathBuf {
    alignments_dir.join(format!("{}.x.{}", ident1, ident2))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl Nucmer {
    /// Align `qry` against `reference` into `outfile` unless it exists.
    /// Returns whether the aligner ran.
    pub fn run_cached(&self, reference: &Path, qry: &Path, outfile: &Path) -> Result<bool> {
        if outfile.exists() {
            debug!("using cached alignments file {:?}", outfile);
            return Ok(false);
        }

        info!("running {:?} alignments...", outfile);
        let prefix = with_suffix(outfile, ".nucmer");
        let delta = with_suffix(&prefix, ".delta");

        let output = Command::new(&self.nucmer_bin)
            .arg("-p")
            .arg(&prefix)
            .arg(reference)
            .arg(qry)
            .output()
            .map_err(|e| Error::Aligner(format!("could not start {:?}: {}", self.nucmer_bin, e)))?;
        if !output.status.success() {
            return Err(Error::Aligner(format!(
                "nucmer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // Written under a temporary name so an interrupted run is not cached.
        let partial = with_suffix(outfile, ".partial");
        let status = Command::new(&self.show_coords_bin)
            .arg("-dTlro")
            .arg(&delta)
            .stdout(Stdio::from(File::create(&partial)?))
            .status()
            .map_err(|e| {
                Error::Aligner(format!("could not start {:?}: {}", self.show_coords_bin, e))
            })?;
        if !status.success() {
            let _ = fs::remove_file(&partial);
            return Err(Error::Aligner(format!("show-coords exited with {}", status)));
        }

        fs::rename(&partial, outfile)?;
        let _ = fs::remove_file(&delta);
        info!("...done!");
        Ok(true)
    }
}

fn field<T: std::str::FromStr>(fields: &[&str], i: usize, line: usize) -> Result<T> {
    fields[i].trim().parse::<T>().map_err(|_| Error::Coords {
        line,
        reason: format!("column {} is not numeric: {:?}", i + 1, fields[i]),
    })
}

/// Parse one tab-separated `show-coords -dTlro` data line.
pub fn parse_coords_line(text: &str, line: usize) -> Result<AlignmentHit> {
    let fields: Vec<&str> = text.trim_end().split('\t').collect();
    if fields.len() < 13 {
        return Err(Error::Coords {
            line,
            reason: format!("expected at least 13 columns, found {}", fields.len()),
        });
    }

    let ref_name = fields[11].to_string();
    let qry_name = fields[12].to_string();
    let ref_start: u64 = field(&fields, 0, line)?;
    let ref_end: u64 = field(&fields, 1, line)?;
    let qry_start: u64 = field(&fields, 2, line)?;
    let qry_end: u64 = field(&fields, 3, line)?;
    let percent_identity: f64 = field(&fields, 6, line)?;
    let is_self_hit = ref_name == qry_name
        && ref_start == qry_start
        && ref_end == qry_end
        && percent_identity == 100.0;

    Ok(AlignmentHit {
        ref_start,
        ref_end,
        qry_start,
        qry_end,
        hit_length_ref: field(&fields, 4, line)?,
        hit_length_qry: field(&fields, 5, line)?,
        percent_identity,
        ref_length: field(&fields, 7, line)?,
        qry_length: field(&fields, 8, line)?,
        ref_name,
        qry_name,
        is_self_hit,
    })
}

/// Read every hit from a coords file, skipping the header block.
pub fn read_coords<P: AsRef<Path>>(path: P) -> Result<Vec<AlignmentHit>> {
    let reader = open_reader(path.as_ref())?;
    let mut hits = Vec::new();
    let mut in_body = false;

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if !in_body {
            in_body = line.starts_with('[');
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        hits.push(parse_coords_line(&line, n + 1)?);
    }

    if !in_body {
        return Err(Error::Coords {
            line: 0,
            reason: format!("no column header in {:?}", path.as_ref()),
        });
    }
    Ok(hits)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) const COORDS: &str = "/tmp/g1.fa /tmp/g2.fa\nNUCMER\n\n\
[S1]\t[E1]\t[S2]\t[E2]\t[LEN 1]\t[LEN 2]\t[% IDY]\t[LEN R]\t[LEN Q]\t[FRM]\t[TAGS]\n\
1\t1000\t1\t1000\t1000\t1000\t99.00\t5000\t4000\t1\t1\tr1\tq1\t[CONTAINS]\n\
10\t109\t20\t119\t100\t100\t80.00\t5000\t300\t1\t1\tr1\tq2\n\
1\t500\t1\t500\t500\t500\t100.00\t500\t500\t1\t1\tr2\tr2\n";

    #[test]
    fn test_read_coords() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("g1.x.g2");
        fs::write(&path, COORDS).unwrap();

        let hits = read_coords(&path).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].ref_name, "r1");
        assert_eq!(hits[0].qry_name, "q1");
        assert_eq!(hits[0].hit_length_qry, 1000);
        assert_eq!(hits[1].percent_identity, 80.0);
        assert_eq!(hits[1].qry_length, 300);
        assert!(!hits[0].is_self_hit);
        assert!(hits[2].is_self_hit);
    }

    #[test]
    fn test_malformed_coords() {
        assert!(matches!(
            parse_coords_line("1\t2\tthree", 7),
            Err(Error::Coords { line: 7, .. })
        ));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, "no header here\n").unwrap();
        assert!(read_coords(&path).is_err());
    }

    #[test]
    fn test_cached_alignments_are_reused() {
        let dir = TempDir::new().unwrap();
        let out = coords_path(dir.path(), "g1.fa", "g2.fa");
        fs::write(&out, COORDS).unwrap();

        let nucmer = Nucmer {
            nucmer_bin: PathBuf::from("/nonexistent/nucmer"),
            show_coords_bin: PathBuf::from("/nonexistent/show-coords"),
        };
        let ran = nucmer
            .run_cached(Path::new("g1.fa"), Path::new("g2.fa"), &out)
            .unwrap();
        assert!(!ran);
    }

    #[test]
    fn test_missing_aligner_is_an_error() {
        let dir = TempDir::new().unwrap();
        let out = coords_path(dir.path(), "a", "b");
        let nucmer = Nucmer {
            nucmer_bin: PathBuf::from("/nonexistent/nucmer"),
            show_coords_bin: PathBuf::from("/nonexistent/show-coords"),
        };
        assert!(matches!(
            nucmer.run_cached(Path::new("a"), Path::new("b"), &out),
            Err(Error::Aligner(_))
        ));
        assert!(!out.exists());
    }
}
