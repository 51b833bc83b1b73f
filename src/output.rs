use std::convert::Infallible;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::model::Feature;

/// Named columns of a GFF/GTF line, in file order.
pub const COLUMNS: [&str; 8] = [
    "seqid", "source", "type", "start", "end", "score", "strand", "phase",
];

/// What the filter command prints for every passing record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputField {
    /// The raw line, byte for byte.
    #[default]
    Line,
    /// The raw attribute column.
    Attributes,
    /// One of [`COLUMNS`], by index.
    Column(usize),
    /// The value of one attribute; nothing when absent.
    Attribute(String),
}

impl FromStr for OutputField {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "all" => OutputField::Line,
            "attributes" => OutputField::Attributes,
            other => match COLUMNS.iter().position(|c| *c == other) {
                Some(i) => OutputField::Column(i),
                None => OutputField::Attribute(other.to_string()),
            },
        })
    }
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputField::Line => f.write_str("all"),
            OutputField::Attributes => f.write_str("attributes"),
            OutputField::Column(i) => f.write_str(COLUMNS.get(*i).copied().unwrap_or("?")),
            OutputField::Attribute(key) => f.write_str(key),
        }
    }
}

impl OutputField {
    /// Write the selected part of one record. Raw text is taken from `raw`
    /// so numbers come out exactly as they were written.
    pub fn write<W: Write>(&self, out: &mut W, feature: &Feature, raw: &str) -> io::Result<()> {
        match self {
            OutputField::Line => out.write_all(raw.as_bytes()),
            OutputField::Attributes => write_line(out, raw.splitn(9, '\t').nth(8).unwrap_or("")),
            OutputField::Column(i) => write_line(out, raw.splitn(9, '\t').nth(*i).unwrap_or("")),
            OutputField::Attribute(key) => match feature.attr(key) {
                Some(value) => write_line(out, value),
                None => Ok(()),
            },
        }
    }
}

/// Write `text` and make sure it ends with exactly one line terminator.
fn write_line<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}
