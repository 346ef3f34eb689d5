use crate::types::{Association, StageCount};
use log::info;
use std::collections::HashMap;

/// Keep at most `snps_per_gene` associations per phenotype, choosing the
/// smallest p-values.
///
/// Ties in p-value keep input order. Output is the kept records of each
/// phenotype, phenotypes in order of first appearance; it is not re-sorted.
pub fn cap_per_phenotype<T: Association>(records: &[T], snps_per_gene: usize) -> (Vec<T>, StageCount) {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&T>> = HashMap::new();
    for r in records {
        let id = r.record().phenotype_id.as_str();
        groups
            .entry(id)
            .or_insert_with(|| {
                order.push(id);
                Vec::new()
            })
            .push(r);
    }

    let mut kept = Vec::with_capacity(records.len());
    for id in order {
        let mut group = groups.remove(id).unwrap_or_default();
        // stable: equal p-values stay in input order
        group.sort_by(|a, b| a.record().pval.total_cmp(&b.record().pval));
        kept.extend(group.into_iter().take(snps_per_gene).cloned());
    }

    let count = StageCount::new(
        format!("limiting to {} SNPs per gene", snps_per_gene),
        records.len(),
        kept.len(),
    );
    info!("After {}: {} / {}", count.stage, count.after, count.before);
    (kept, count)
}
