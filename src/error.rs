use thiserror::Error;

/// Structural failures that abort a run.
///
/// Per-record problems (unresolvable coordinates, cis-proximal pairs) are not
/// errors: the stage drops the record and counts it.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
