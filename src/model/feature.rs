use crate::annotation::attributes::{Attributes, Dialect};
use crate::types::{Interval, Strand};

/// One annotation record.
///
/// Built fresh for every data line by the reader and not mutated afterwards;
/// consumers that rewrite records (the GTF projector) work on copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// `ID`, else `Name`, else (GTF) the first attribute value.
    pub id: Option<String>,
    pub feature_type: String,
    pub source: String,
    /// `.` => None
    pub score: Option<f64>,
    /// `.` => None, else 0/1/2
    pub frame: Option<u8>,
    pub attributes: Attributes,
    pub interval: Interval,
    pub dialect: Dialect,
}

impl Feature {
    #[inline]
    pub fn seqname(&self) -> &str {
        &self.interval.seqname
    }

    #[inline]
    pub fn strand(&self) -> Strand {
        self.interval.strand
    }

    /// Convenience: get an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    /// Frame as written in column 8 (`.` when absent).
    pub fn phase_str(&self) -> String {
        match self.frame {
            Some(f) => f.to_string(),
            None => ".".to_string(),
        }
    }

    /// Score as written in column 6 (`.` when absent).
    pub fn score_str(&self) -> String {
        match self.score {
            Some(s) => s.to_string(),
            None => ".".to_string(),
        }
    }

    /// Pick the record identifier out of its attributes.
    pub(crate) fn identifier(attributes: &Attributes, dialect: Dialect) -> Option<String> {
        if let Some(v) = attributes.get("ID").or_else(|| attributes.get("Name")) {
            return Some(v.clone());
        }
        match dialect {
            Dialect::Gtf => attributes.values().next().cloned(),
            _ => None,
        }
    }
}
