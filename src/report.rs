use crate::classify::{Classification, DropCounts};
use crate::redundancy::cap_per_phenotype;
use crate::types::{Association, AssociationRecord, ClassifiedAssociation, FilterConfig, StageCount, TransType};
use log::{info, warn};
use statrs::statistics::{Data, Median};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Final, ordered record set plus its summary
#[derive(Debug, Clone)]
pub struct Report<T> {
    pub records: Vec<T>,
    pub summary: Summary,
}

/// Extra statistics for distance-classified output
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationSummary {
    pub trans_types: Vec<(TransType, usize)>,
    pub median_same_chrom_distance: Option<f64>,
    pub drops: DropCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub associations: usize,
    pub unique_genes: usize,
    pub unique_snps: usize,
    pub median_abs_slope: Option<f64>,
    pub min_pval: Option<f64>,
    pub max_pval: Option<f64>,
    pub classification: Option<ClassificationSummary>,
    pub stages: Vec<StageCount>,
}

fn median(values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(Data::new(values).median())
    }
}

impl Summary {
    pub fn from_records<T: Association>(records: &[T], stages: Vec<StageCount>) -> Self {
        let unique_genes: HashSet<&str> = records.iter().map(|r| r.record().phenotype_id.as_str()).collect();
        let unique_snps: HashSet<&str> = records.iter().map(|r| r.record().variant_id.as_str()).collect();
        let pvals = records.iter().map(|r| r.record().pval);

        Summary {
            associations: records.len(),
            unique_genes: unique_genes.len(),
            unique_snps: unique_snps.len(),
            median_abs_slope: median(records.iter().map(|r| r.record().abs_slope()).collect()),
            min_pval: pvals.clone().min_by(|a, b| a.total_cmp(b)),
            max_pval: pvals.max_by(|a, b| a.total_cmp(b)),
            classification: None,
            stages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.associations == 0
    }

    /// Plain-text report, one statistic per line.
    pub fn render<'a>(&'a self, input: &'a Path, output: &'a Path) -> SummaryText<'a> {
        SummaryText {
            summary: self,
            input,
            output,
        }
    }

    /// Echo the headline numbers to the log.
    pub fn log(&self) {
        if self.is_empty() {
            warn!("No trans-eQTLs passed filtering criteria");
            return;
        }
        info!("Final trans-eQTL count: {}", self.associations);
        info!("Unique genes: {}", self.unique_genes);
        info!("Unique SNPs: {}", self.unique_snps);
        if let Some(m) = self.median_abs_slope {
            info!("Median |effect size|: {:.4}", m);
        }
        if let Some(p) = self.min_pval {
            info!("Min p-value: {:.2e}", p);
        }
    }
}

/// Summary rendered against the input and output paths of a run
pub struct SummaryText<'a> {
    summary: &'a Summary,
    input: &'a Path,
    output: &'a Path,
}

fn or_na(v: Option<String>) -> String {
    v.unwrap_or_else(|| "NA".to_string())
}

impl fmt::Display for SummaryText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary;
        let title = if s.classification.is_some() {
            "True Trans-eQTL Statistics"
        } else {
            "Trans-eQTL Filtering Statistics"
        };

        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;
        writeln!(f, "Input file: {}", self.input.display())?;
        writeln!(f, "Output file: {}", self.output.display())?;
        writeln!(f, "Final associations: {}", s.associations)?;
        writeln!(f, "Unique genes: {}", s.unique_genes)?;
        writeln!(f, "Unique SNPs: {}", s.unique_snps)?;
        writeln!(
            f,
            "Median |effect size|: {}",
            or_na(s.median_abs_slope.map(|v| format!("{:.4}", v)))
        )?;
        writeln!(f, "Min p-value: {}", or_na(s.min_pval.map(|v| format!("{:.2e}", v))))?;
        writeln!(f, "Max p-value: {}", or_na(s.max_pval.map(|v| format!("{:.2e}", v))))?;

        if let Some(ref c) = s.classification {
            writeln!(f, "Trans types:")?;
            for (trans_type, count) in &c.trans_types {
                writeln!(f, "  {}: {}", trans_type.as_str(), count)?;
            }
            writeln!(
                f,
                "Median distance (same chrom): {}",
                or_na(c.median_same_chrom_distance.map(|v| format!("{:.0} bp", v)))
            )?;
            writeln!(f, "Dropped (unresolved gene): {}", c.drops.unresolved_gene)?;
            writeln!(f, "Dropped (unresolved variant): {}", c.drops.unresolved_variant)?;
            writeln!(f, "Dropped (cis-proximal): {}", c.drops.cis_proximal)?;
        }

        if !s.stages.is_empty() {
            writeln!(f, "Stage counts (after / before):")?;
            for stage in &s.stages {
                writeln!(f, "  {}: {} / {}", stage.stage, stage.after, stage.before)?;
            }
        }

        if s.is_empty() {
            writeln!(f, "No associations passed filtering criteria.")?;
        }
        Ok(())
    }
}

/// Apply the per-gene cap unless an upstream stage already did, so the cap
/// is enforced exactly once on the way to the output.
fn ensure_capped<T: Association>(
    records: &[T],
    config: &FilterConfig,
    already_capped: bool,
    stages: &mut Vec<StageCount>,
) -> Vec<T> {
    if already_capped {
        return records.to_vec();
    }
    let (capped, count) = cap_per_phenotype(records, config.snps_per_gene);
    stages.push(count);
    capped
}

/// Order by p-value ascending, then |slope| descending; remaining ties keep
/// input order.
pub fn order_by_significance(records: &[AssociationRecord]) -> Vec<AssociationRecord> {
    let mut ordered = records.to_vec();
    ordered.sort_by(|a, b| {
        a.pval
            .total_cmp(&b.pval)
            .then_with(|| b.abs_slope().total_cmp(&a.abs_slope()))
    });
    ordered
}

/// Order by p-value ascending, then distance descending (cross-chromosome
/// first); remaining ties keep input order.
pub fn order_by_distance(records: &[ClassifiedAssociation]) -> Vec<ClassifiedAssociation> {
    let mut ordered = records.to_vec();
    ordered.sort_by(|a, b| {
        a.record
            .pval
            .total_cmp(&b.record.pval)
            .then_with(|| b.placement.distance.cmp(&a.placement.distance))
    });
    ordered
}

/// Final report for threshold-filtered output.
pub fn report_associations(
    records: &[AssociationRecord],
    config: &FilterConfig,
    already_capped: bool,
    mut stages: Vec<StageCount>,
) -> Report<AssociationRecord> {
    let capped = ensure_capped(records, config, already_capped, &mut stages);
    let records = order_by_significance(&capped);
    let summary = Summary::from_records(&records, stages);
    Report { records, summary }
}

/// Final report for distance-classified output.
pub fn report_classified(
    classification: &Classification,
    config: &FilterConfig,
    already_capped: bool,
    mut stages: Vec<StageCount>,
) -> Report<ClassifiedAssociation> {
    let capped = ensure_capped(&classification.kept, config, already_capped, &mut stages);
    let records = order_by_distance(&capped);

    let trans_types = TransType::ALL
        .iter()
        .map(|&t| (t, records.iter().filter(|r| r.placement.trans_type == t).count()))
        .collect();
    let same_chrom: Vec<f64> = records
        .iter()
        .filter_map(|r| r.placement.distance.finite())
        .map(|d| d as f64)
        .collect();

    let mut summary = Summary::from_records(&records, stages);
    summary.classification = Some(ClassificationSummary {
        trans_types,
        median_same_chrom_distance: median(same_chrom),
        drops: classification.drops,
    });
    Report { records, summary }
}
