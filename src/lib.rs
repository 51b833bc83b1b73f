//! gfftool
//!
//! Streaming GFF3/GTF reader with a composable record filter chain,
//! GFF3 to GTF conversion, summary statistics and sequence extraction.
//! Intervals are 0-based, half-open.

pub mod types;
pub mod model;
pub mod annotation;
pub mod filter;
pub mod region;
pub mod convert;
pub mod stats;
pub mod sequence;
pub mod output;

pub use annotation::{GffReader, ParseError, ReaderBuilder};

pub use types::{Interval, Strand};

pub use model::Feature;

pub use filter::{Filter, FilterChain, FilterError, FilterParam, FilterParams};
pub use region::{Region, RegionError, RegionWarning};

pub use convert::{convert_records, ConvertError, ConvertOptions, GtfProjector};
pub use output::OutputField;
pub use sequence::{extract_sequence, IndexedFasta, SequenceError, SequenceSource};
pub use stats::Summary;
