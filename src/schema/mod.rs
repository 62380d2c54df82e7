//! Schema inference: column detection, standardization, and multi-file
//! combination.

pub mod combine;
pub mod mapper;
pub mod patterns;
pub mod read;

pub use combine::{combine_files, CombinedIngest, FileOutcome};
pub use mapper::{ColumnMapper, MappingReport};
pub use read::{read_delimited, RawTable};
