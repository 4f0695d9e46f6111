use std::{
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::taxonomy::Lineage;

pub fn write_csv<P: AsRef<Path>, T: Serialize>(outpath: P, data: &[T]) -> Result<()> {
    let outpath = outpath.as_ref();
    let mut writer = csv::Writer::from_path(outpath)
        .with_context(|| anyhow!("Could not create file: {:?}", outpath))?;

    for row in data {
        writer.serialize(row)?;
    }

    writer.flush()?;
    Ok(())
}

/// One hash value per line, newline-terminated.
pub fn write_hash_list<'a, P, I>(outpath: P, hashes: I) -> Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a u64>,
{
    let outpath = outpath.as_ref();
    let outfile = std::fs::File::create(outpath)
        .with_context(|| anyhow!("Could not create file: {:?}", outpath))?;
    let mut writer = BufWriter::new(outfile);

    let mut n = 0;
    for hashval in hashes {
        writeln!(writer, "{}", hashval)?;
        n += 1;
    }

    writer.flush()?;
    Ok(n)
}

/// `<count> <lineage>` per line.
pub fn write_lineage_counts<P: AsRef<Path>>(outpath: P, data: &[(Lineage, u64)]) -> Result<()> {
    let outpath = outpath.as_ref();
    let outfile = std::fs::File::create(outpath)
        .with_context(|| anyhow!("Could not create file: {:?}", outpath))?;
    let mut writer = BufWriter::new(outfile);

    for (lineage, count) in data {
        writeln!(writer, "{} {}", count, lineage)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DigRow;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_write_csv_and_hash_list() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("dig.csv");
        let rows = vec![DigRow {
            status: "chimera".into(),
            name: "genome, one".into(),
            filename: "g1.fna.gz".into(),
            md5sum: "abc".into(),
        }];
        write_csv(&csv_path, &rows).unwrap();
        assert_eq!(
            fs::read_to_string(&csv_path).unwrap(),
            "status,name,filename,md5sum\nchimera,\"genome, one\",g1.fna.gz,abc\n"
        );

        let hash_path = dir.path().join("hashes.txt");
        let n = write_hash_list(&hash_path, &[3, 1]).unwrap();
        assert_eq!(n, 2);
        assert_eq!(fs::read_to_string(&hash_path).unwrap(), "3\n1\n");
    }

    #[test]
    fn test_write_lineage_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info.txt");
        write_lineage_counts(&path, &[(Lineage::parse("Bacteria;Firmicutes"), 7)]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "7 Bacteria;Firmicutes\n");
    }
}
