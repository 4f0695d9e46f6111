use anyhow::{anyhow, Context};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::{
    collections::BTreeSet,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

fn is_gz(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

/// Buffered reader over a plain or gzip-compressed file.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gz(path) {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Output file that compresses when its path ends in `.gz`.
///
/// Call [`FileWriter::finish`] when done: dropping a gzip writer cannot
/// report a failure to write the trailer.
pub enum FileWriter {
    Plain(BufWriter<File>),
    Gz(GzEncoder<BufWriter<File>>),
}

impl FileWriter {
    pub fn finish(self) -> io::Result<()> {
        match self {
            FileWriter::Plain(mut writer) => writer.flush(),
            FileWriter::Gz(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileWriter::Plain(writer) => writer.write(buf),
            FileWriter::Gz(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileWriter::Plain(writer) => writer.flush(),
            FileWriter::Gz(encoder) => encoder.flush(),
        }
    }
}

pub fn create_writer<P: AsRef<Path>>(path: P) -> Result<FileWriter> {
    let path = path.as_ref();
    let file = BufWriter::new(File::create(path)?);
    let writer = if is_gz(path) {
        FileWriter::Gz(GzEncoder::new(file, Compression::default()))
    } else {
        FileWriter::Plain(file)
    };
    Ok(writer)
}

pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> anyhow::Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create dir: {:?}", dir))
}

/// Expand files and directories into the files whose names end in one of
/// `exts`. Files named explicitly are always kept.
pub fn collect_files(inputs: &[PathBuf], exts: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for input in inputs {
        if !input.is_dir() {
            if !input.exists() {
                return Err(anyhow!("No such file: {:?}", input));
            }
            found.push(input.clone());
            continue;
        }

        let entries = std::fs::read_dir(input)
            .with_context(|| format!("Failed to list dir: {:?}", input))?;

        let mut paths = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                    exts.iter()
                        .any(|ext| filename.to_lowercase().ends_with(ext))
                } else {
                    false
                }
            })
            .collect::<Vec<_>>();

        if paths.is_empty() {
            return Err(anyhow!("No matching files found in path: {:?}", input));
        }
        paths.sort();
        found.extend(paths);
    }
    Ok(found)
}

/// The single genome file for `ident` under `genomes_dir`.
pub fn find_genome_filename(genomes_dir: &Path, ident: &str) -> Result<PathBuf> {
    let pattern = Path::new(&glob::Pattern::escape(&genomes_dir.to_string_lossy()))
        .join(format!("{}*_genomic.fna.gz", glob::Pattern::escape(ident)))
        .to_string_lossy()
        .into_owned();

    let matches: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| Error::AmbiguousGenome {
            pattern: format!("{} ({})", pattern, e),
            found: Vec::new(),
        })?
        .filter_map(std::result::Result::ok)
        .collect();

    match matches.as_slice() {
        [single] => Ok(single.clone()),
        _ => Err(Error::AmbiguousGenome {
            pattern,
            found: matches,
        }),
    }
}

/// Copy a genome file, decompressing it if needed.
pub fn decompress_into(src: &Path, dest: &Path) -> anyhow::Result<()> {
    let mut reader =
        open_reader(src).with_context(|| anyhow!("Could not open genome: {:?}", src))?;
    let file =
        File::create(dest).with_context(|| anyhow!("Could not create file: {:?}", dest))?;
    let mut writer = BufWriter::new(file);
    std::io::copy(&mut reader, &mut writer)
        .with_context(|| anyhow!("Could not copy {:?} to {:?}", src, dest))?;
    writer.flush()?;
    Ok(())
}

/// One unsigned hash value per line; blank lines are ignored.
pub fn read_hash_list<P: AsRef<Path>>(path: P) -> anyhow::Result<BTreeSet<u64>> {
    let path = path.as_ref();
    let reader = open_reader(path).with_context(|| format!("Failed to open: {:?}", path))?;

    let mut hashes = BTreeSet::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let hashval = line
            .parse::<u64>()
            .with_context(|| format!("{:?} line {}: not a hash value: {}", path, n + 1, line))?;
        hashes.insert(hashval);
    }
    Ok(hashes)
}
