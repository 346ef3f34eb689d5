use crate::types::{AssociationRecord, ClassifiedAssociation};
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

pub const EFFECT_COLUMNS: [&str; 2] = ["abs_slope", "effect_direction"];

pub const PLACEMENT_COLUMNS: [&str; 6] = [
    "gene_chrom",
    "gene_pos",
    "var_chrom",
    "var_pos",
    "distance",
    "trans_type",
];

/// Input columns copied through unchanged. A column sharing its name with a
/// derived column (e.g. output of an earlier run fed back in) is replaced by
/// the freshly derived value.
struct Layout {
    passthrough: Vec<usize>,
    header: Vec<String>,
}

impl Layout {
    fn new(columns: &[String], derived: &[&str]) -> Self {
        let passthrough: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !derived.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();
        let header = passthrough
            .iter()
            .map(|&i| columns[i].clone())
            .chain(derived.iter().map(|c| c.to_string()))
            .collect();
        Layout { passthrough, header }
    }

    fn row(&self, record: &AssociationRecord) -> Vec<String> {
        let mut row: Vec<String> = self
            .passthrough
            .iter()
            .map(|&i| record.fields.get(i).cloned().unwrap_or_default())
            .collect();
        row.push(record.abs_slope().to_string());
        row.push(record.effect_direction().as_str().to_string());
        row
    }
}

fn tsv_writer<W: Write>(writer: W) -> Writer<W> {
    WriterBuilder::new().delimiter(b'\t').from_writer(writer)
}

/// An output destination written through a temporary file in the same
/// directory. Nothing appears at `path` until [`StagedFile::commit`]; dropping
/// an uncommitted file deletes the temporary.
pub struct StagedFile {
    path: PathBuf,
    tmp: NamedTempFile,
}

impl StagedFile {
    pub fn create(path: &Path) -> Result<Self> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut builder = Builder::new();
        builder.prefix(".trans-filter-");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let tmp = builder
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        Ok(StagedFile {
            path: path.to_path_buf(),
            tmp,
        })
    }

    pub fn writer(&mut self) -> BufWriter<&mut File> {
        BufWriter::new(self.tmp.as_file_mut())
    }

    /// Move the finished file into place, replacing any existing file.
    pub fn commit(self) -> Result<PathBuf> {
        let path = self.path;
        self.tmp
            .persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Write threshold-filtered associations: input columns, then `abs_slope`
/// and `effect_direction`. An empty set still gets its header row.
pub fn write_associations<W: Write>(writer: W, columns: &[String], records: &[AssociationRecord]) -> Result<()> {
    let layout = Layout::new(columns, &EFFECT_COLUMNS);
    let mut wtr = tsv_writer(writer);

    wtr.write_record(&layout.header)?;
    for record in records {
        wtr.write_record(layout.row(record))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write classified associations: the threshold-filtered layout plus the
/// gene/variant placement columns.
pub fn write_classified<W: Write>(writer: W, columns: &[String], records: &[ClassifiedAssociation]) -> Result<()> {
    let derived: Vec<&str> = EFFECT_COLUMNS.iter().chain(PLACEMENT_COLUMNS.iter()).copied().collect();
    let layout = Layout::new(columns, &derived);
    let mut wtr = tsv_writer(writer);

    wtr.write_record(&layout.header)?;
    for c in records {
        let p = &c.placement;
        let mut row = layout.row(&c.record);
        row.extend([
            p.gene.chrom.clone(),
            p.gene.pos.to_string(),
            p.variant.chrom.clone(),
            p.variant.pos.to_string(),
            p.distance.to_string(),
            p.trans_type.as_str().to_string(),
        ]);
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_summary<W: Write>(mut writer: W, text: &str) -> Result<()> {
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Summary path next to the output table: `<stem>_stats.txt`.
pub fn default_stats_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "trans_eqtl".to_string());
    output.with_file_name(format!("{}_stats.txt", stem))
}
