use crate::types::Locus;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use log::info;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Strip a leading, case-sensitive "chr" from a chromosome label.
pub fn normalize_chrom(label: &str) -> &str {
    label.strip_prefix("chr").unwrap_or(label)
}

/// Parse a variant id into its chromosome and position.
///
/// Accepted forms are `chr<C>_<POS>_<REF>_<ALT>` (only the first two
/// underscore fields are read) and `chr<C>:<POS>`. Anything else, or a
/// position that is not an integer, is unresolved.
pub fn parse_variant_id(variant_id: &str) -> Option<Locus> {
    let (chrom, pos) = if variant_id.contains('_') {
        let mut parts = variant_id.split('_');
        (parts.next()?, parts.next()?)
    } else if variant_id.contains(':') {
        variant_id.split_once(':')?
    } else {
        return None;
    };

    let pos = pos.parse::<i64>().ok()?;
    Some(Locus::new(normalize_chrom(chrom), pos))
}

/// Gene and variant coordinate lookups shared by the distance classifier.
///
/// The gene map is built once from a coordinate table and never changes, so
/// lookups are pure and safe to issue from many threads.
#[derive(Debug, Clone, Default)]
pub struct PositionResolver {
    genes: HashMap<String, Locus>,
}

impl PositionResolver {
    pub fn from_loci<I>(genes: I) -> Self
    where
        I: IntoIterator<Item = (String, Locus)>,
    {
        PositionResolver {
            genes: genes.into_iter().collect(),
        }
    }

    /// Load a headerless, tab-separated `chrom start end gene_id` table.
    pub fn load_gene_table(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open gene coordinate table: {}", path.display()))?;
        let resolver = Self::read_gene_table(file)
            .with_context(|| format!("Failed to read gene coordinate table: {}", path.display()))?;
        info!("Loaded {} gene positions from {}", resolver.len(), path.display());
        Ok(resolver)
    }

    /// Each gene is placed at the floor midpoint of its interval. Columns
    /// past the fourth are ignored; a repeated gene id keeps its last row.
    pub fn read_gene_table<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut genes = HashMap::new();
        for (i, row) in rdr.records().enumerate() {
            let row = row.with_context(|| format!("Failed to parse gene table line {}", i + 1))?;
            let ctx = || format!("gene table line {}", i + 1);
            if row.len() < 4 {
                anyhow::bail!("{}: expected 4 columns, found {}", ctx(), row.len());
            }

            let chrom = normalize_chrom(&row[0]).to_string();
            let start: i64 = row[1].trim().parse().with_context(ctx)?;
            let end: i64 = row[2].trim().parse().with_context(ctx)?;
            let gene_id = row[3].to_string();

            let span = start
                .checked_add(end)
                .with_context(|| format!("{}: coordinates overflow", ctx()))?;

            genes.insert(gene_id, Locus::new(chrom, span.div_euclid(2)));
        }

        Ok(PositionResolver { genes })
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn resolve_gene(&self, gene_id: &str) -> Option<&Locus> {
        self.genes.get(gene_id)
    }

    pub fn resolve_variant(&self, variant_id: &str) -> Option<Locus> {
        parse_variant_id(variant_id)
    }
}
