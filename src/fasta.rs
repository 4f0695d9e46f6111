use std::{
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{anyhow, Context};
use seq_io::fasta::{Reader, Record};

use crate::{io::open_reader, types::Contig};

pub fn read_fasta<P>(path: P) -> anyhow::Result<Vec<Contig>>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let buf_reader =
        open_reader(path).with_context(|| anyhow!("Could not open FASTA: {:?}", path))?;

    let mut reader = Reader::new(buf_reader);
    let mut contigs = Vec::new();

    while let Some(record) = reader.next() {
        let record = record.with_context(|| anyhow!("Malformed FASTA: {:?}", path))?;

        let id = record.id()?.to_string();
        let header = String::from_utf8(record.head().to_vec())?;
        let sequence = record.owned_seq();
        contigs.push(Contig {
            id,
            header,
            sequence,
        });
    }

    Ok(contigs)
}

/// Two lines per record: header and unwrapped sequence.
pub fn write_fasta<'a, P, I>(path: P, contigs: I) -> anyhow::Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a Contig>,
{
    let path = path.as_ref();
    let outfile = std::fs::File::create(path)
        .with_context(|| anyhow!("Could not create file: {:?}", path))?;
    let mut writer = BufWriter::new(outfile);

    for contig in contigs {
        writeln!(writer, ">{}", contig.header)?;
        writer.write_all(&contig.sequence)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_write_fasta() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genome.fa");
        fs::write(&path, ">ctg1 some description\nACGT\nAC\n>ctg2\nGG\n").unwrap();

        let contigs = read_fasta(&path).unwrap();
        assert_eq!(contigs.len(), 2);
        assert_eq!(contigs[0].id, "ctg1");
        assert_eq!(contigs[0].header, "ctg1 some description");
        assert_eq!(contigs[0].length(), 6);

        let out = dir.path().join("out.fa");
        write_fasta(&out, &contigs).unwrap();
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            ">ctg1 some description\nACGTAC\n>ctg2\nGG\n"
        );
    }
}
