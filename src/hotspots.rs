use crate::types::{Association, StageCount};
use log::info;
use std::collections::{HashMap, HashSet};

/// Variants associated with at least `gene_count_threshold` distinct phenotypes.
pub fn find_hotspots<T: Association>(records: &[T], gene_count_threshold: usize) -> HashSet<String> {
    let mut phenotypes_per_variant: HashMap<&str, HashSet<&str>> = HashMap::new();
    for r in records {
        let r = r.record();
        phenotypes_per_variant
            .entry(r.variant_id.as_str())
            .or_default()
            .insert(r.phenotype_id.as_str());
    }

    phenotypes_per_variant
        .into_iter()
        .filter(|(_, phenotypes)| phenotypes.len() >= gene_count_threshold)
        .map(|(variant, _)| variant.to_string())
        .collect()
}

/// Remove every record that references a hotspot variant, not just the excess.
pub fn remove_hotspots<T: Association>(records: &[T], gene_count_threshold: usize) -> (Vec<T>, StageCount) {
    let hotspots = find_hotspots(records, gene_count_threshold);
    let kept: Vec<T> = records
        .iter()
        .filter(|r| !hotspots.contains(&r.record().variant_id))
        .cloned()
        .collect();

    let count = StageCount::new(
        format!("hotspot filter (SNPs affecting >={} genes)", gene_count_threshold),
        records.len(),
        kept.len(),
    );
    info!(
        "After {}: {} / {} ({} hotspot variants)",
        count.stage,
        count.after,
        count.before,
        hotspots.len()
    );
    (kept, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssociationRecord;

    fn make_record(phenotype: &str, variant: &str, pval: f64) -> AssociationRecord {
        AssociationRecord {
            phenotype_id: phenotype.to_string(),
            variant_id: variant.to_string(),
            pval,
            qval: 0.01,
            slope: 0.5,
            maf: None,
            phenotype_chr: None,
            variant_chr: None,
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_hotspot_removed_regardless_of_pvalue() {
        // two hotspot variants, each tied to 4 distinct genes, plus two ordinary records
        let mut records = Vec::new();
        for g in ["g1", "g2", "g3", "g4"] {
            records.push(make_record(g, "hot1", 1e-30));
            records.push(make_record(g, "hot2", 1e-40));
        }
        records.push(make_record("g1", "ok1", 1e-9));
        records.push(make_record("g5", "ok2", 1e-9));
        assert_eq!(records.len(), 10);

        let (kept, count) = remove_hotspots(&records, 3);
        let variants: Vec<&str> = kept.iter().map(|r| r.variant_id.as_str()).collect();
        assert_eq!(variants, vec!["ok1", "ok2"]);
        assert_eq!(count.removed(), 8);
    }

    #[test]
    fn test_counts_distinct_phenotypes_only() {
        // same phenotype repeated does not make a hotspot
        let records = vec![
            make_record("g1", "v", 1e-9),
            make_record("g1", "v", 1e-10),
            make_record("g1", "v", 1e-11),
            make_record("g2", "v", 1e-11),
        ];
        assert!(find_hotspots(&records, 3).is_empty());
        assert_eq!(find_hotspots(&records, 2).len(), 1);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let records = vec![
            make_record("g1", "v", 1e-9),
            make_record("g2", "v", 1e-9),
            make_record("g3", "v", 1e-9),
        ];
        let (kept, _) = remove_hotspots(&records, 3);
        assert!(kept.is_empty());
        let (kept, _) = remove_hotspots(&records, 4);
        assert_eq!(kept.len(), 3);
    }
}
