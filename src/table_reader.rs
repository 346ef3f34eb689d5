use crate::error::FilterError;
use crate::types::{AssociationRecord, AssociationTable};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};
use std::io::Read;
use std::path::Path;

pub const REQUIRED_COLUMNS: [&str; 5] = ["phenotype_id", "variant_id", "pval", "qval", "slope"];

/// Column positions of the known schema within one input header.
struct ColumnIndex {
    phenotype_id: usize,
    variant_id: usize,
    pval: usize,
    qval: usize,
    slope: usize,
    maf: Option<usize>,
    phenotype_chr: Option<usize>,
    variant_chr: Option<usize>,
}

impl ColumnIndex {
    fn from_header(columns: &[String]) -> Result<Self, FilterError> {
        check_schema(columns)?;
        let find = |name: &str| columns.iter().position(|c| c == name);

        let required = |name: &str| find(name).ok_or_else(|| FilterError::Schema {
            missing: vec![name.to_string()],
        });

        Ok(ColumnIndex {
            phenotype_id: required("phenotype_id")?,
            variant_id: required("variant_id")?,
            pval: required("pval")?,
            qval: required("qval")?,
            slope: required("slope")?,
            maf: find("maf"),
            phenotype_chr: find("phenotype_chr"),
            variant_chr: find("variant_chr"),
        })
    }
}

/// Fail with [`FilterError::Schema`] naming every required column the header lacks.
pub fn check_schema(columns: &[String]) -> Result<(), FilterError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|&&name| !columns.iter().any(|c| c == name))
        .map(|&name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(FilterError::Schema { missing })
    }
}

/// Read a tab-separated association table from disk.
pub fn load_association_table(path: &Path) -> Result<AssociationTable> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open association table: {}", path.display()))?;
    let table = read_association_table(file)
        .with_context(|| format!("Failed to read association table: {}", path.display()))?;
    info!("Loaded {} associations from {}", table.records.len(), path.display());
    Ok(table)
}

/// Decode an association table from any reader.
///
/// The header is validated before any row is parsed; a missing required
/// column fails with [`FilterError::Schema`]. A zero-byte input is an empty
/// table carrying only the required columns.
pub fn read_association_table<R: Read>(reader: R) -> Result<AssociationTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        warn!("Input table is empty; treating it as a table with no associations");
        return Ok(AssociationTable {
            columns: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            records: Vec::new(),
        });
    }

    let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let index = ColumnIndex::from_header(&columns)?;

    let mut records = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row = row.with_context(|| format!("Failed to parse row {}", i + 1))?;
        records.push(parse_record(&row, &index, i + 1)?);
    }

    Ok(AssociationTable { columns, records })
}

fn parse_record(row: &StringRecord, index: &ColumnIndex, line: usize) -> Result<AssociationRecord> {
    let ctx = |column: &str| format!("row {}, column '{}'", line, column);
    let cell = |i: usize, column: &str| row.get(i).with_context(|| ctx(column));

    let optional_text = |i: Option<usize>, column: &str| -> Result<Option<String>> {
        match i {
            Some(i) => Ok(Some(cell(i, column)?.to_string())),
            None => Ok(None),
        }
    };

    let maf = match index.maf {
        Some(i) => Some(parse_float(cell(i, "maf")?).with_context(|| ctx("maf"))?),
        None => None,
    };

    Ok(AssociationRecord {
        phenotype_id: cell(index.phenotype_id, "phenotype_id")?.to_string(),
        variant_id: cell(index.variant_id, "variant_id")?.to_string(),
        pval: parse_float(cell(index.pval, "pval")?).with_context(|| ctx("pval"))?,
        qval: parse_float(cell(index.qval, "qval")?).with_context(|| ctx("qval"))?,
        slope: parse_float(cell(index.slope, "slope")?).with_context(|| ctx("slope"))?,
        maf,
        phenotype_chr: optional_text(index.phenotype_chr, "phenotype_chr")?,
        variant_chr: optional_text(index.variant_chr, "variant_chr")?,
        fields: row.iter().map(|f| f.to_string()).collect(),
    })
}

/// Parse a numeric cell. Empty and `NA` cells are missing values and read as NaN,
/// which then fails every threshold comparison.
fn parse_float(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("na") {
        return Ok(f64::NAN);
    }
    s.parse::<f64>()
        .with_context(|| format!("'{}' is not a number", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "phenotype_id\tvariant_id\tpval\tqval\tslope\tmaf\n";

    #[test]
    fn test_reads_known_and_extra_columns() {
        let data = "phenotype_id\tvariant_id\textra\tpval\tqval\tslope\n\
                    g1\tchr1_100_A_G\tx\t1e-10\t0.01\t-0.5\n";
        let table = read_association_table(data.as_bytes()).unwrap();
        assert_eq!(table.columns.len(), 6);
        assert_eq!(table.records.len(), 1);

        let r = &table.records[0];
        assert_eq!(r.phenotype_id, "g1");
        assert_eq!(r.variant_id, "chr1_100_A_G");
        assert_eq!(r.slope, -0.5);
        assert!(r.maf.is_none());
        assert!(r.phenotype_chr.is_none());
        assert_eq!(r.fields[2], "x");
        assert_eq!(r.fields[3], "1e-10");
    }

    #[test]
    fn test_missing_columns_reported() {
        let data = "phenotype_id\tpval\tslope\ng1\t0.1\t0.2\n";
        let err = read_association_table(data.as_bytes()).unwrap_err();
        match err.downcast_ref::<FilterError>() {
            Some(FilterError::Schema { missing }) => {
                assert_eq!(missing, &vec!["variant_id".to_string(), "qval".to_string()]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_maf_reads_as_nan() {
        let data = format!("{}g1\tchr1:5\t1e-10\t0.01\t0.5\tNA\n", HEADER);
        let table = read_association_table(data.as_bytes()).unwrap();
        assert!(table.records[0].maf.unwrap().is_nan());
    }

    #[test]
    fn test_non_numeric_pval_is_fatal() {
        let data = format!("{}g1\tchr1:5\tabc\t0.01\t0.5\t0.2\n", HEADER);
        assert!(read_association_table(data.as_bytes()).is_err());
    }

    #[test]
    fn test_zero_byte_input_is_empty_table() {
        let table = read_association_table("".as_bytes()).unwrap();
        assert!(table.records.is_empty());
        assert_eq!(table.columns, REQUIRED_COLUMNS.to_vec());
    }

    #[test]
    fn test_header_only_input() {
        let table = read_association_table(HEADER.as_bytes()).unwrap();
        assert!(table.records.is_empty());
        assert!(table.has_column("maf"));
    }
}
