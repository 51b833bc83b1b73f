use std::fmt;

use serde::{Deserialize, Serialize};

/// Genomic strand/orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Plus,
    Minus,
    Unknown,
}

impl Strand {
    /// Parse column 7 of a GFF/GTF line. `?` is folded into `Unknown`.
    pub fn parse(s: &str) -> Option<Strand> {
        match s {
            "+" => Some(Strand::Plus),
            "-" => Some(Strand::Minus),
            "." | "?" => Some(Strand::Unknown),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Strand::Plus => "+",
            Strand::Minus => "-",
            Strand::Unknown => ".",
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stranded interval on a named sequence.
///
/// Coordinates are 0-based with an exclusive end: [start, end).
/// Records read with the closed-end convention map `start..=end` (1-based)
/// to `[start - 1, end)`; with the half-open convention the end is
/// decremented as well. `start <= end` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub seqname: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

impl Interval {
    pub fn new(seqname: impl Into<String>, start: u64, end: u64, strand: Strand) -> Self {
        debug_assert!(start <= end, "Interval requires start <= end");
        Self {
            seqname: seqname.into(),
            start,
            end,
            strand,
        }
    }

    /// Build from 1-based file coordinates.
    ///
    /// Returns `None` if `start1` is 0 or `end1 < start1`.
    pub fn from_one_based(
        seqname: impl Into<String>,
        start1: u64,
        end1: u64,
        strand: Strand,
        end_included: bool,
    ) -> Option<Self> {
        if start1 == 0 || end1 < start1 {
            return None;
        }
        let end = if end_included { end1 } else { end1 - 1 };
        Some(Self::new(seqname, start1 - 1, end, strand))
    }

    /// Inverse of [`Interval::from_one_based`]: (start, end) as written in a file.
    pub fn to_one_based(&self, end_included: bool) -> (u64, u64) {
        let end = if end_included { self.end } else { self.end + 1 };
        (self.start + 1, end)
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if `other` lies on the same sequence and fully inside `self`.
    #[inline]
    pub fn contains(&self, other: &Interval) -> bool {
        self.seqname == other.seqname && self.start <= other.start && other.end <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strand_parse_and_display() {
        assert_eq!(Strand::parse("+"), Some(Strand::Plus));
        assert_eq!(Strand::parse("-"), Some(Strand::Minus));
        assert_eq!(Strand::parse("?"), Some(Strand::Unknown));
        assert_eq!(Strand::parse("x"), None);
        assert_eq!(Strand::Unknown.to_string(), ".");
    }

    #[test]
    fn closed_end_keeps_end() {
        let iv = Interval::from_one_based("chr1", 101, 150, Strand::Plus, true).unwrap();
        assert_eq!((iv.start, iv.end), (100, 150));
        assert_eq!(iv.len(), 50);
        assert_eq!(iv.to_one_based(true), (101, 150));
    }

    #[test]
    fn half_open_end_is_decremented() {
        let iv = Interval::from_one_based("chr1", 101, 150, Strand::Minus, false).unwrap();
        assert_eq!((iv.start, iv.end), (100, 149));
        assert_eq!(iv.to_one_based(false), (101, 150));

        // single-base record collapses to an empty interval, still valid
        let iv = Interval::from_one_based("chr1", 7, 7, Strand::Plus, false).unwrap();
        assert!(iv.is_empty());
    }

    #[test]
    fn rejects_bad_coordinates() {
        assert!(Interval::from_one_based("chr1", 0, 10, Strand::Plus, true).is_none());
        assert!(Interval::from_one_based("chr1", 20, 10, Strand::Plus, true).is_none());
    }

    #[test]
    fn contains_checks_sequence_and_bounds() {
        let outer = Interval::new("chr1", 10, 100, Strand::Plus);
        assert!(outer.contains(&Interval::new("chr1", 10, 100, Strand::Minus)));
        assert!(!outer.contains(&Interval::new("chr1", 9, 50, Strand::Plus)));
        assert!(!outer.contains(&Interval::new("chr2", 20, 50, Strand::Plus)));
    }
}
