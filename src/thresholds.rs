use crate::positions::normalize_chrom;
use crate::types::{AssociationRecord, FilterConfig, StageCount};
use log::info;
use rayon::prelude::*;

/// Keep the records matching `keep`, in input order, and log the stage counts.
fn apply_stage<F>(stage: String, records: &[AssociationRecord], keep: F) -> (Vec<AssociationRecord>, StageCount)
where
    F: Fn(&AssociationRecord) -> bool + Sync,
{
    let kept: Vec<AssociationRecord> = records.par_iter().filter(|r| keep(*r)).cloned().collect();
    let count = StageCount::new(stage, records.len(), kept.len());
    info!("After {}: {} / {}", count.stage, count.after, count.before);
    (kept, count)
}

/// Apply the per-record significance and quality thresholds, in order:
/// q-value, p-value, |slope|, then MAF when the table carries a `maf` column.
///
/// Comparisons against NaN are false, so missing values never pass.
pub fn apply_thresholds(
    records: &[AssociationRecord],
    config: &FilterConfig,
    has_maf: bool,
) -> (Vec<AssociationRecord>, Vec<StageCount>) {
    let mut counts = Vec::with_capacity(4);

    let (kept, count) = apply_stage(
        format!("FDR filter (qval < {})", config.qval_threshold),
        records,
        |r| r.qval < config.qval_threshold,
    );
    counts.push(count);

    let (kept, count) = apply_stage(
        format!("p-value filter (pval < {})", config.pval_threshold),
        &kept,
        |r| r.pval < config.pval_threshold,
    );
    counts.push(count);

    let (mut kept, count) = apply_stage(
        format!("effect size filter (|slope| > {})", config.effect_size_threshold),
        &kept,
        |r| r.abs_slope() > config.effect_size_threshold,
    );
    counts.push(count);

    if has_maf {
        let (after_maf, count) = apply_stage(
            format!("MAF filter (MAF >= {})", config.min_maf),
            &kept,
            |r| r.maf.map_or(true, |maf| maf >= config.min_maf),
        );
        counts.push(count);
        kept = after_maf;
    }

    (kept, counts)
}

/// Drop records whose pre-annotated phenotype and variant chromosomes match.
///
/// Labels are compared after stripping a "chr" prefix. A record with either
/// label absent or empty cannot be judged and is kept.
pub fn filter_cis_by_labels(records: &[AssociationRecord]) -> (Vec<AssociationRecord>, StageCount) {
    apply_stage("cis-acting filter (phenotype_chr != variant_chr)".to_string(), records, |r| {
        match (r.phenotype_chr.as_deref(), r.variant_chr.as_deref()) {
            (Some(p), Some(v)) if !p.is_empty() && !v.is_empty() => {
                normalize_chrom(p) != normalize_chrom(v)
            }
            _ => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(id: &str, pval: f64, qval: f64, slope: f64, maf: Option<f64>) -> AssociationRecord {
        AssociationRecord {
            phenotype_id: id.to_string(),
            variant_id: format!("chr1_{}_A_G", id.len()),
            pval,
            qval,
            slope,
            maf,
            phenotype_chr: None,
            variant_chr: None,
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_each_threshold_applied() {
        let records = vec![
            make_record("keep", 1e-10, 0.01, 0.5, Some(0.2)),
            make_record("high_q", 1e-10, 0.05, 0.5, Some(0.2)),
            make_record("high_p", 1e-8, 0.01, 0.5, Some(0.2)),
            make_record("small_effect", 1e-10, 0.01, -0.1, Some(0.2)),
            make_record("rare", 1e-10, 0.01, -0.5, Some(0.01)),
            make_record("maf_at_limit", 1e-10, 0.01, -0.5, Some(0.05)),
        ];
        let (kept, counts) = apply_thresholds(&records, &FilterConfig::default(), true);
        let ids: Vec<&str> = kept.iter().map(|r| r.phenotype_id.as_str()).collect();
        assert_eq!(ids, vec!["keep", "maf_at_limit"]);

        let afters: Vec<usize> = counts.iter().map(|c| c.after).collect();
        assert_eq!(afters, vec![5, 4, 3, 2]);
    }

    #[test]
    fn test_counts_are_monotonic() {
        let records: Vec<AssociationRecord> = (0..50)
            .map(|i| {
                let f = i as f64;
                make_record("g", 10f64.powf(-f / 3.0), f / 500.0, (f - 25.0) / 50.0, Some(f / 100.0))
            })
            .collect();
        let (_, counts) = apply_thresholds(&records, &FilterConfig::default(), true);
        assert_eq!(counts[0].before, 50);
        for pair in counts.windows(2) {
            assert!(pair[0].after <= pair[0].before);
            assert_eq!(pair[0].after, pair[1].before);
        }
    }

    #[test]
    fn test_maf_stage_skipped_without_column() {
        let records = vec![make_record("g", 1e-10, 0.01, 0.5, None)];
        let (kept, counts) = apply_thresholds(&records, &FilterConfig::default(), false);
        assert_eq!(kept.len(), 1);
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_nan_values_never_pass() {
        let records = vec![
            make_record("nan_q", 1e-10, f64::NAN, 0.5, Some(0.2)),
            make_record("nan_maf", 1e-10, 0.01, 0.5, Some(f64::NAN)),
        ];
        let (kept, _) = apply_thresholds(&records, &FilterConfig::default(), true);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_filter_cis_by_labels() {
        let mut same = make_record("same", 1e-10, 0.01, 0.5, None);
        same.phenotype_chr = Some("chr1".to_string());
        same.variant_chr = Some("1".to_string());
        let mut different = make_record("different", 1e-10, 0.01, 0.5, None);
        different.phenotype_chr = Some("chr1".to_string());
        different.variant_chr = Some("chr2".to_string());
        let mut unlabeled = make_record("unlabeled", 1e-10, 0.01, 0.5, None);
        unlabeled.phenotype_chr = Some(String::new());
        unlabeled.variant_chr = Some("chr2".to_string());

        let (kept, count) = filter_cis_by_labels(&[same, different, unlabeled]);
        let ids: Vec<&str> = kept.iter().map(|r| r.phenotype_id.as_str()).collect();
        assert_eq!(ids, vec!["different", "unlabeled"]);
        assert_eq!(count.removed(), 1);
    }
}
