use crate::error::FilterError;
use std::fmt;

/// Sign of an association's effect size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectDirection {
    Positive,
    Negative,
}

impl EffectDirection {
    /// Zero slopes count as negative.
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            EffectDirection::Positive
        } else {
            EffectDirection::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectDirection::Positive => "positive",
            EffectDirection::Negative => "negative",
        }
    }
}

/// One candidate (phenotype, variant) association as read from the input table
#[derive(Debug, Clone)]
pub struct AssociationRecord {
    pub phenotype_id: String,
    pub variant_id: String,
    pub pval: f64,
    pub qval: f64,
    pub slope: f64,
    /// `None` when the table has no `maf` column
    pub maf: Option<f64>,
    pub phenotype_chr: Option<String>,
    pub variant_chr: Option<String>,
    /// Original cell text in input column order, re-emitted verbatim on output
    pub fields: Vec<String>,
}

impl AssociationRecord {
    pub fn abs_slope(&self) -> f64 {
        self.slope.abs()
    }

    pub fn effect_direction(&self) -> EffectDirection {
        EffectDirection::from_slope(self.slope)
    }
}

/// Input table: header plus records, in file order
#[derive(Debug, Clone, Default)]
pub struct AssociationTable {
    pub columns: Vec<String>,
    pub records: Vec<AssociationRecord>,
}

impl AssociationTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Anything carrying an association record, so grouping and ordering stages
/// work on plain and classified sets alike.
pub trait Association: Clone + Send + Sync {
    fn record(&self) -> &AssociationRecord;
}

impl Association for AssociationRecord {
    fn record(&self) -> &AssociationRecord {
        self
    }
}

/// A resolved genomic coordinate; chromosome carries no "chr" prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locus {
    pub chrom: String,
    pub pos: i64,
}

impl Locus {
    pub fn new(chrom: impl Into<String>, pos: i64) -> Self {
        Locus {
            chrom: chrom.into(),
            pos,
        }
    }
}

/// Gene-to-variant distance. Cross-chromosome pairs are infinitely far apart,
/// so `Infinite` orders after every finite distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Distance {
    Finite(u64),
    Infinite,
}

impl Distance {
    pub fn finite(&self) -> Option<u64> {
        match self {
            Distance::Finite(d) => Some(*d),
            Distance::Infinite => None,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Finite(d) => write!(f, "{}", d),
            Distance::Infinite => f.write_str("inf"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransType {
    DifferentChrom,
    SameChromDistance,
    #[default]
    Unknown,
}

impl TransType {
    pub const ALL: [TransType; 3] = [
        TransType::DifferentChrom,
        TransType::SameChromDistance,
        TransType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransType::DifferentChrom => "different_chrom",
            TransType::SameChromDistance => "same_chrom_distance",
            TransType::Unknown => "unknown",
        }
    }
}

/// Positional annotation attached by the distance classifier.
///
/// `DifferentChrom` always pairs with `Distance::Infinite`;
/// `SameChromDistance` always pairs with a finite distance above the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub gene: Locus,
    pub variant: Locus,
    pub distance: Distance,
    pub trans_type: TransType,
}

/// A record that survived distance classification
#[derive(Debug, Clone)]
pub struct ClassifiedAssociation {
    pub record: AssociationRecord,
    pub placement: Placement,
}

impl Association for ClassifiedAssociation {
    fn record(&self) -> &AssociationRecord {
        &self.record
    }
}

/// Every threshold and toggle of a run. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub qval_threshold: f64,
    pub pval_threshold: f64,
    pub effect_size_threshold: f64,
    pub min_maf: f64,
    pub gene_count_threshold: usize,
    pub snps_per_gene: usize,
    pub distance_threshold: u64,
    pub filter_hotspots: bool,
    pub filter_cis_acting: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            qval_threshold: 0.05,
            pval_threshold: 1e-8,
            effect_size_threshold: 0.1,
            min_maf: 0.05,
            gene_count_threshold: 3,
            snps_per_gene: 5,
            distance_threshold: 5_000_000,
            filter_hotspots: false,
            filter_cis_acting: false,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), FilterError> {
        let probability = |name: &str, v: f64| {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(FilterError::InvalidConfig(format!(
                    "{} must lie in [0, 1], got {}",
                    name, v
                )))
            }
        };
        probability("qval_threshold", self.qval_threshold)?;
        probability("pval_threshold", self.pval_threshold)?;
        probability("min_maf", self.min_maf)?;

        if !self.effect_size_threshold.is_finite() || self.effect_size_threshold < 0.0 {
            return Err(FilterError::InvalidConfig(format!(
                "effect_size_threshold must be a non-negative number, got {}",
                self.effect_size_threshold
            )));
        }
        if self.snps_per_gene == 0 {
            return Err(FilterError::InvalidConfig(
                "snps_per_gene must be at least 1".to_string(),
            ));
        }
        if self.gene_count_threshold == 0 {
            return Err(FilterError::InvalidConfig(
                "gene_count_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Record counts around one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCount {
    pub stage: String,
    pub before: usize,
    pub after: usize,
}

impl StageCount {
    pub fn new(stage: impl Into<String>, before: usize, after: usize) -> Self {
        StageCount {
            stage: stage.into(),
            before,
            after,
        }
    }

    pub fn removed(&self) -> usize {
        self.before.saturating_sub(self.after)
    }
}
