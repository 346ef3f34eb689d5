pub mod classify;
pub mod error;
pub mod hotspots;
pub mod output;
pub mod pipeline;
pub mod positions;
pub mod redundancy;
pub mod report;
pub mod table_reader;
pub mod thresholds;
pub mod types;
