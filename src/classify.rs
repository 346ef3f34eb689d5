use crate::positions::PositionResolver;
use crate::types::{AssociationRecord, ClassifiedAssociation, Distance, Locus, Placement, StageCount, TransType};
use indicatif::ProgressBar;
use log::info;
use rayon::prelude::*;

/// Why a record left the classifier without a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnresolvedGene,
    UnresolvedVariant,
    CisProximal,
}

/// Records dropped by the classifier, per reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub unresolved_gene: usize,
    pub unresolved_variant: usize,
    pub cis_proximal: usize,
}

impl DropCounts {
    fn add(&mut self, reason: DropReason) {
        match reason {
            DropReason::UnresolvedGene => self.unresolved_gene += 1,
            DropReason::UnresolvedVariant => self.unresolved_variant += 1,
            DropReason::CisProximal => self.cis_proximal += 1,
        }
    }

    pub fn unresolved(&self) -> usize {
        self.unresolved_gene + self.unresolved_variant
    }

    pub fn total(&self) -> usize {
        self.unresolved() + self.cis_proximal
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub kept: Vec<ClassifiedAssociation>,
    pub drops: DropCounts,
    pub stage: StageCount,
}

impl Classification {
    pub fn count(&self, trans_type: TransType) -> usize {
        self.kept
            .iter()
            .filter(|c| c.placement.trans_type == trans_type)
            .count()
    }
}

/// Place a gene/variant pair. Same-chromosome pairs at or under
/// `distance_threshold` are cis-proximal and get no placement.
pub fn classify_pair(gene: &Locus, variant: &Locus, distance_threshold: u64) -> Option<Placement> {
    if gene.chrom != variant.chrom {
        return Some(Placement {
            gene: gene.clone(),
            variant: variant.clone(),
            distance: Distance::Infinite,
            trans_type: TransType::DifferentChrom,
        });
    }

    let distance = gene.pos.abs_diff(variant.pos);
    if distance > distance_threshold {
        Some(Placement {
            gene: gene.clone(),
            variant: variant.clone(),
            distance: Distance::Finite(distance),
            trans_type: TransType::SameChromDistance,
        })
    } else {
        None
    }
}

fn classify_record(
    record: &AssociationRecord,
    resolver: &PositionResolver,
    distance_threshold: u64,
) -> Result<Placement, DropReason> {
    let gene = resolver
        .resolve_gene(&record.phenotype_id)
        .ok_or(DropReason::UnresolvedGene)?;
    let variant = resolver
        .resolve_variant(&record.variant_id)
        .ok_or(DropReason::UnresolvedVariant)?;
    classify_pair(gene, &variant, distance_threshold).ok_or(DropReason::CisProximal)
}

/// Keep only genuine trans associations: different chromosome, or the same
/// chromosome more than `distance_threshold` bp apart.
///
/// Records whose gene or variant cannot be placed are dropped and counted.
/// Never adds records; survivors keep their input order.
pub fn classify_trans(
    records: &[AssociationRecord],
    resolver: &PositionResolver,
    distance_threshold: u64,
    progress: Option<&ProgressBar>,
) -> Classification {
    if let Some(pb) = progress {
        pb.set_length(records.len() as u64);
        pb.set_position(0);
    }

    let verdicts: Vec<Result<Placement, DropReason>> = records
        .par_iter()
        .map(|r| {
            if let Some(pb) = progress {
                pb.inc(1);
            }
            classify_record(r, resolver, distance_threshold)
        })
        .collect();

    let mut kept = Vec::with_capacity(records.len());
    let mut drops = DropCounts::default();
    for (record, verdict) in records.iter().zip(verdicts) {
        match verdict {
            Ok(placement) => kept.push(ClassifiedAssociation {
                record: record.clone(),
                placement,
            }),
            Err(reason) => drops.add(reason),
        }
    }

    let stage = StageCount::new(
        format!("true trans classification (same-chrom distance > {} bp)", distance_threshold),
        records.len(),
        kept.len(),
    );
    let result = Classification { kept, drops, stage };

    info!("After {}: {} / {}", result.stage.stage, result.stage.after, result.stage.before);
    info!(
        "  Dropped: {} unresolved gene, {} unresolved variant, {} cis-proximal",
        drops.unresolved_gene, drops.unresolved_variant, drops.cis_proximal
    );
    info!("Trans-eQTL types:");
    for trans_type in [TransType::DifferentChrom, TransType::SameChromDistance] {
        info!("  {}: {}", trans_type.as_str(), result.count(trans_type));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(phenotype: &str, variant: &str) -> AssociationRecord {
        AssociationRecord {
            phenotype_id: phenotype.to_string(),
            variant_id: variant.to_string(),
            pval: 1e-10,
            qval: 0.01,
            slope: 0.5,
            maf: None,
            phenotype_chr: None,
            variant_chr: None,
            fields: Vec::new(),
        }
    }

    fn make_resolver() -> PositionResolver {
        PositionResolver::from_loci([
            ("geneA".to_string(), Locus::new("2", 100_000)),
            ("geneB".to_string(), Locus::new("5", 20_000_000)),
        ])
    }

    #[test]
    fn test_same_chrom_within_threshold_dropped() {
        let c = classify_trans(&[make_record("geneA", "chr2_500000_A_G")], &make_resolver(), 5_000_000, None);
        assert!(c.kept.is_empty());
        assert_eq!(c.drops.cis_proximal, 1);
    }

    #[test]
    fn test_different_chrom_retained_as_infinite() {
        let c = classify_trans(&[make_record("geneA", "chr5_100_A_G")], &make_resolver(), 5_000_000, None);
        assert_eq!(c.kept.len(), 1);
        let p = &c.kept[0].placement;
        assert_eq!(p.trans_type, TransType::DifferentChrom);
        assert_eq!(p.distance, Distance::Infinite);
        assert_eq!(p.gene, Locus::new("2", 100_000));
        assert_eq!(p.variant, Locus::new("5", 100));
    }

    #[test]
    fn test_same_chrom_far_retained() {
        let c = classify_trans(&[make_record("geneB", "chr5:100")], &make_resolver(), 5_000_000, None);
        assert_eq!(c.kept.len(), 1);
        assert_eq!(c.kept[0].placement.trans_type, TransType::SameChromDistance);
        assert_eq!(c.kept[0].placement.distance, Distance::Finite(19_999_900));
    }

    #[test]
    fn test_distance_equal_to_threshold_is_not_trans() {
        let gene = Locus::new("1", 1_000);
        assert!(classify_pair(&gene, &Locus::new("1", 6_000), 5_000).is_none());
        assert!(classify_pair(&gene, &Locus::new("1", 6_001), 5_000).is_some());
        assert!(classify_pair(&gene, &Locus::new("1", 0), 999).is_some());
    }

    #[test]
    fn test_unresolved_records_counted() {
        let records = vec![
            make_record("missing_gene", "chr1_5_A_G"),
            make_record("geneA", "rs42"),
            make_record("geneA", "chr1_5_A_G"),
        ];
        let c = classify_trans(&records, &make_resolver(), 5_000_000, None);
        assert_eq!(c.kept.len(), 1);
        assert_eq!(c.drops.unresolved_gene, 1);
        assert_eq!(c.drops.unresolved_variant, 1);
        assert_eq!(c.drops.total(), 2);
        assert_eq!(c.stage.before, 3);
        assert_eq!(c.stage.after, 1);
    }

    #[test]
    fn test_progress_tracks_classified_records_only() {
        let pb = ProgressBar::hidden();
        pb.set_length(100);
        let records = vec![make_record("geneA", "chr5_100_A_G"), make_record("geneB", "chr5_100_A_G")];
        classify_trans(&records, &make_resolver(), 5_000_000, Some(&pb));
        assert_eq!(pb.length(), Some(2));
        assert_eq!(pb.position(), 2);
    }

    #[test]
    fn test_every_kept_record_has_consistent_placement() {
        let records: Vec<AssociationRecord> = (0..30)
            .map(|i| make_record(if i % 2 == 0 { "geneA" } else { "geneB" }, &format!("chr{}_{}_A_G", i % 6, i * 1_000_000)))
            .collect();
        let c = classify_trans(&records, &make_resolver(), 5_000_000, None);
        for kept in &c.kept {
            let p = &kept.placement;
            match p.trans_type {
                TransType::DifferentChrom => assert_eq!(p.distance, Distance::Infinite),
                TransType::SameChromDistance => assert!(p.distance.finite().unwrap() > 5_000_000),
                TransType::Unknown => panic!("classified record labelled unknown"),
            }
        }
        assert_eq!(c.kept.len() + c.drops.total(), records.len());
    }
}
