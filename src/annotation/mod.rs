pub mod attributes;
pub mod builder;
pub mod io;

pub use attributes::{Attributes, Dialect};
pub use builder::ReaderBuilder;
pub use io::{GffReader, LineSource, Metadata, ParseError, Records};
