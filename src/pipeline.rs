use crate::classify::classify_trans;
use crate::error::FilterError;
use crate::hotspots::remove_hotspots;
use crate::output;
use crate::positions::PositionResolver;
use crate::redundancy::cap_per_phenotype;
use crate::report::{report_associations, report_classified, Report, Summary};
use crate::table_reader::check_schema;
use crate::thresholds::{apply_thresholds, filter_cis_by_labels};
use crate::types::{AssociationRecord, AssociationTable, ClassifiedAssociation, FilterConfig};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::{info, warn};
use std::path::Path;

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub enum PipelineOutput {
    /// Threshold-filtered set, ordered by p-value then |slope|
    Filtered(Report<AssociationRecord>),
    /// Distance-classified "true trans" set, ordered by p-value then distance
    Classified(Report<ClassifiedAssociation>),
}

impl PipelineOutput {
    pub fn summary(&self) -> &Summary {
        match self {
            PipelineOutput::Filtered(report) => &report.summary,
            PipelineOutput::Classified(report) => &report.summary,
        }
    }

    pub fn len(&self) -> usize {
        self.summary().associations
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the table and its summary. Both files are always produced, even
    /// for an empty result. Both are staged next to their destinations and
    /// moved into place only after both writes succeed, so a failed write
    /// leaves neither file behind.
    pub fn write(&self, columns: &[String], input: &Path, table_path: &Path, stats_path: &Path) -> Result<()> {
        let mut table = output::StagedFile::create(table_path)?;
        let mut stats = output::StagedFile::create(stats_path)?;

        let written = match self {
            PipelineOutput::Filtered(report) => output::write_associations(table.writer(), columns, &report.records),
            PipelineOutput::Classified(report) => output::write_classified(table.writer(), columns, &report.records),
        };
        written.with_context(|| format!("Failed to write {}", table_path.display()))?;

        let text = self.summary().render(input, table_path).to_string();
        output::write_summary(stats.writer(), &text)
            .with_context(|| format!("Failed to write {}", stats_path.display()))?;

        let table_path = table.commit()?;
        if let Err(e) = stats.commit() {
            if let Err(rm) = std::fs::remove_file(&table_path) {
                warn!("Failed to remove {} after error: {}", table_path.display(), rm);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Run every stage over `table`.
///
/// Order: thresholds, per-gene cap, hotspot removal (if enabled), cis
/// removal (if enabled), then final ordering and summary. Cis removal uses
/// distance classification when `resolver` is given, otherwise the
/// pre-annotated `phenotype_chr`/`variant_chr` columns. Each stage builds a
/// new record set; `table` is never modified.
pub fn run(
    table: &AssociationTable,
    config: &FilterConfig,
    resolver: Option<&PositionResolver>,
    progress: Option<&ProgressBar>,
) -> Result<PipelineOutput, FilterError> {
    config.validate()?;
    check_schema(&table.columns)?;

    info!("Initial trans-eQTL count: {}", table.records.len());

    let (filtered, mut stages) = apply_thresholds(&table.records, config, table.has_column("maf"));

    let (mut current, count) = cap_per_phenotype(&filtered, config.snps_per_gene);
    stages.push(count);

    if config.filter_hotspots {
        let (kept, count) = remove_hotspots(&current, config.gene_count_threshold);
        stages.push(count);
        current = kept;
    }

    if config.filter_cis_acting {
        if let Some(resolver) = resolver {
            if resolver.is_empty() {
                warn!("Gene coordinate table is empty; every association will be unresolved");
            }
            let classification = classify_trans(&current, resolver, config.distance_threshold, progress);
            stages.push(classification.stage.clone());
            let report = report_classified(&classification, config, true, stages);
            report.summary.log();
            return Ok(PipelineOutput::Classified(report));
        }

        if table.has_column("phenotype_chr") && table.has_column("variant_chr") {
            let (kept, count) = filter_cis_by_labels(&current);
            stages.push(count);
            current = kept;
        } else {
            warn!(
                "Cis-acting filter requested but neither a gene coordinate table nor \
                 phenotype_chr/variant_chr columns are available; skipping"
            );
        }
    }

    let report = report_associations(&current, config, true, stages);
    report.summary.log();
    Ok(PipelineOutput::Filtered(report))
}
