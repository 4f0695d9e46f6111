//! Classification spreadsheets: collecting unresolved signatures,
//! converting classify output to lineage sheets and comparing sheets.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use log::{info, warn};

use super::classify::{classify_csv, unclassified_dir};
use crate::{
    io::ensure_dir,
    lca::lca_of,
    taxonomy::{Lineage, Rank},
    types::ClassifyRow,
};

fn read_classify_csv(path: &Path) -> anyhow::Result<Vec<ClassifyRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open {:?}", path))?;
    reader
        .deserialize()
        .collect::<Result<Vec<ClassifyRow>, _>>()
        .with_context(|| format!("Malformed classify CSV {:?}", path))
}

/// Copy the signatures of every root or superkingdom classification of
/// each prefix into `sigdir`. Returns the number copied.
pub fn grab_sigs(prefixes: &[String], sigdir: &Path) -> anyhow::Result<usize> {
    if sigdir.exists() {
        warn!("sigdir {:?} already exists, continuing...", sigdir);
    }
    ensure_dir(sigdir)?;

    let mut total = 0;
    for prefix in prefixes {
        let dirname = unclassified_dir(prefix);
        let mut n = 0;

        for (m, row) in read_classify_csv(&classify_csv(prefix))?.iter().enumerate() {
            if m % 10000 == 0 {
                info!("{} {} {}", prefix, m, n);
            }
            if row.rank != "superkingdom" && row.rank != "root" {
                continue;
            }
            let sigfile = dirname.join(format!("{}.sig", row.md5sum));
            let outfile = sigdir.join(format!("{}.sig", row.md5sum));
            fs::copy(&sigfile, &outfile)
                .with_context(|| format!("Could not copy {:?} to {:?}", sigfile, outfile))?;
            n += 1;
        }

        info!("{} {}", prefix, n);
        total += n;
    }
    Ok(total)
}

/// Merge classify CSVs into one `accession,superkingdom,...,species`
/// sheet. Later rows for the same name replace earlier ones.
pub fn to_lineages(csvs: &[PathBuf], output: &Path) -> anyhow::Result<usize> {
    let mut order: Vec<String> = Vec::new();
    let mut ident_to_tax: HashMap<String, String> = HashMap::new();

    for path in csvs {
        let rows = read_classify_csv(path)?;
        for row in &rows {
            if ident_to_tax
                .insert(row.name.clone(), row.lineage.clone())
                .is_some()
            {
                warn!("*** WARNING *** ident {} occurs more than once!?", row.name);
            } else {
                order.push(row.name.clone());
            }
        }
        info!("loaded {} rows from bulk classify csv {:?}", rows.len(), path);
    }
    info!("{} rows total", order.len());

    let ranks = Rank::without_strain();
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| anyhow!("Could not create file: {:?}", output))?;

    let mut header = vec!["accession"];
    header.extend(ranks.iter().map(|r| r.as_str()));
    writer.write_record(&header)?;

    for ident in &order {
        let mut record = vec![ident.as_str()];
        let names: Vec<&str> = ident_to_tax[ident].split(';').collect();
        record.extend((0..ranks.len()).map(|i| names.get(i).copied().unwrap_or("")));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!("done! {} rows written to {:?}", order.len(), output);
    Ok(order.len())
}

/// Identifier -> lineage from a spreadsheet whose lineage columns start
/// at the 1-based `start_column`. The first row is a header.
pub fn load_lineage_sheet(path: &Path, start_column: usize) -> anyhow::Result<BTreeMap<String, Lineage>> {
    if start_column < 2 {
        return Err(anyhow!("start column must be 2 or greater, got {}", start_column));
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut lineages = BTreeMap::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed lineage sheet {:?}", path))?;
        let Some(ident) = record.get(0) else {
            continue;
        };
        let names: Vec<&str> = record.iter().skip(start_column - 1).collect();
        if lineages
            .insert(ident.to_string(), Lineage::from_names(&names))
            .is_some()
        {
            warn!("{:?}: duplicate identifier {}", path, ident);
        }
    }
    Ok(lineages)
}

/// Agreement between a reference and a query lineage sheet.
#[derive(Debug, Default)]
pub struct LineageComparison {
    pub reference_only: usize,
    pub query_only: usize,
    pub common: usize,
    pub same: usize,
    pub different: usize,
    /// Query is an ancestor of the reference, keyed by the query's rank.
    pub consistent_at: BTreeMap<Option<Rank>, usize>,
    /// Keyed by the rank where the two lineages part.
    pub disagree_at: BTreeMap<Option<Rank>, usize>,
    /// Consistent identifiers resolved no deeper than phylum.
    pub shallow: Vec<String>,
}

impl LineageComparison {
    pub fn consistent(&self) -> usize {
        self.consistent_at.values().sum()
    }

    pub fn disagree(&self) -> usize {
        self.disagree_at.values().sum()
    }
}

pub fn compare_sheets(
    reference: &BTreeMap<String, Lineage>,
    query: &BTreeMap<String, Lineage>,
) -> LineageComparison {
    let mut cmp = LineageComparison {
        reference_only: reference.keys().filter(|k| !query.contains_key(*k)).count(),
        query_only: query.keys().filter(|k| !reference.contains_key(*k)).count(),
        ..Default::default()
    };

    for (ident, ref_lineage) in reference {
        let Some(qry_lineage) = query.get(ident) else {
            continue;
        };
        cmp.common += 1;

        if ref_lineage == qry_lineage {
            cmp.same += 1;
            continue;
        }
        cmp.different += 1;

        if qry_lineage.is_prefix_of(ref_lineage) {
            let rank = qry_lineage.rank();
            *cmp.consistent_at.entry(rank).or_insert(0) += 1;
            if matches!(rank, Some(Rank::Superkingdom) | Some(Rank::Phylum)) {
                cmp.shallow.push(ident.clone());
            }
        } else {
            let (lca, _) = lca_of([ref_lineage, qry_lineage]);
            *cmp.disagree_at.entry(lca.rank()).or_insert(0) += 1;
        }
    }
    cmp
}

fn log_by_rank(counts: &BTreeMap<Option<Rank>, usize>) {
    for rank in Rank::without_strain() {
        info!(
            "   rank: {} / count: {}",
            rank,
            counts.get(&Some(*rank)).copied().unwrap_or(0)
        );
    }
    if let Some(n) = counts.get(&None) {
        info!("   rank: root / count: {}", n);
    }
}

pub fn compare_lineages(
    reference: &Path,
    query: &Path,
    reference_start_column: usize,
    query_start_column: usize,
    shallow_out: Option<&Path>,
) -> anyhow::Result<LineageComparison> {
    let ref_sheet = load_lineage_sheet(reference, reference_start_column)?;
    let qry_sheet = load_lineage_sheet(query, query_start_column)?;

    let cmp = compare_sheets(&ref_sheet, &qry_sheet);

    info!("reference only: {}", cmp.reference_only);
    info!("query only: {}", cmp.query_only);
    info!("common: {}", cmp.common);
    info!("same: {}", cmp.same);
    info!("different: {}", cmp.different);
    info!("different but consistent: {}", cmp.consistent());
    log_by_rank(&cmp.consistent_at);
    info!("inconsistent: {}", cmp.disagree());
    log_by_rank(&cmp.disagree_at);

    if let Some(path) = shallow_out {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| anyhow!("Could not create file: {:?}", path))?;
        for ident in &cmp.shallow {
            writer.write_record([ident])?;
        }
        writer.flush()?;
    }
    Ok(cmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::write_csv;
    use std::fs;
    use tempfile::TempDir;

    fn row(rank: &str, name: &str, md5sum: &str, lineage: &str) -> ClassifyRow {
        ClassifyRow {
            rank: rank.into(),
            name: name.into(),
            filename: format!("{}.fna.gz", name),
            md5sum: md5sum.into(),
            lineage: lineage.into(),
        }
    }

    #[test]
    fn test_grab_sigs() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("run").to_string_lossy().into_owned();
        let sigs = unclassified_dir(&prefix);
        fs::create_dir(&sigs).unwrap();
        fs::write(sigs.join("aaa.sig"), "[]").unwrap();
        fs::write(sigs.join("bbb.sig"), "[]").unwrap();

        let rows = vec![
            row("root", "g1", "aaa", ""),
            row("superkingdom", "g2", "bbb", "Bacteria"),
            row("phylum", "g3", "ccc", "Bacteria;Firmicutes"),
        ];
        write_csv(classify_csv(&prefix), &rows).unwrap();

        let outdir = dir.path().join("collected");
        assert_eq!(grab_sigs(&[prefix], &outdir).unwrap(), 2);
        assert!(outdir.join("aaa.sig").exists());
        assert!(outdir.join("bbb.sig").exists());
        assert!(!outdir.join("ccc.sig").exists());
    }

    #[test]
    fn test_to_lineages() {
        let dir = TempDir::new().unwrap();
        let csv1 = dir.path().join("a.csv");
        let csv2 = dir.path().join("b.csv");
        write_csv(&csv1, &[row("phylum", "g1", "aaa", "Bacteria;Firmicutes")]).unwrap();
        write_csv(
            &csv2,
            &[
                row("root", "g2", "bbb", ""),
                row("superkingdom", "g1", "ccc", "Bacteria"),
            ],
        )
        .unwrap();

        let out = dir.path().join("lineages.csv");
        assert_eq!(to_lineages(&[csv1, csv2], &out).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "accession,superkingdom,phylum,class,order,family,genus,species\n\
             g1,Bacteria,,,,,,\n\
             g2,,,,,,,\n"
        );

        let sheet = load_lineage_sheet(&out, 2).unwrap();
        assert_eq!(sheet["g1"], Lineage::parse("Bacteria"));
        assert!(sheet["g2"].is_empty());
    }

    #[test]
    fn test_compare_sheets() {
        let sheet = |items: &[(&str, &str)]| -> BTreeMap<String, Lineage> {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), Lineage::parse(v)))
                .collect()
        };
        let reference = sheet(&[
            ("g1", "Bacteria;Firmicutes;Bacilli"),
            ("g2", "Bacteria;Firmicutes;Bacilli"),
            ("g3", "Bacteria;Firmicutes;Bacilli"),
            ("g4", "Bacteria;Proteobacteria"),
            ("g5", "Archaea"),
        ]);
        let query = sheet(&[
            ("g1", "Bacteria;Firmicutes;Bacilli"),
            ("g2", "Bacteria;Firmicutes"),
            ("g3", "Bacteria;Firmicutes;Clostridia"),
            ("g4", "Archaea;Euryarchaeota"),
            ("g6", "Bacteria"),
        ]);

        let cmp = compare_sheets(&reference, &query);
        assert_eq!(cmp.common, 4);
        assert_eq!(cmp.reference_only, 1);
        assert_eq!(cmp.query_only, 1);
        assert_eq!(cmp.same, 1);
        assert_eq!(cmp.different, 3);
        assert_eq!(cmp.consistent(), 1);
        assert_eq!(cmp.consistent_at[&Some(Rank::Phylum)], 1);
        assert_eq!(cmp.shallow, vec!["g2".to_string()]);
        assert_eq!(cmp.disagree_at[&Some(Rank::Phylum)], 1);
        assert_eq!(cmp.disagree_at[&None], 1);
    }

    #[test]
    fn test_start_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gtdb.csv");
        fs::write(
            &path,
            "accession,gtdb_id,superkingdom,phylum\nGCA_1,x,Bacteria,Firmicutes\n",
        )
        .unwrap();
        let sheet = load_lineage_sheet(&path, 3).unwrap();
        assert_eq!(sheet["GCA_1"], Lineage::parse("Bacteria;Firmicutes"));
        assert!(load_lineage_sheet(&path, 1).is_err());
    }
}
