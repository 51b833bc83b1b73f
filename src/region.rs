//! `seqname:start-end` region strings.
//!
//! User input is 1-based inclusive; containment checks run on the 0-based
//! half-open coordinates used by [`Interval`]. The conversion happens here
//! and nowhere else.

use std::fmt;

use thiserror::Error;

use crate::types::Interval;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("invalid region '{region}': {reason}")]
    InvalidRegion { region: String, reason: &'static str },
}

/// Which side of a region a warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bound::Start => "start",
            Bound::End => "end",
        })
    }
}

/// A non-fatal parse problem: the bound was dropped and the region is open
/// on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionWarning {
    pub region: String,
    pub bound: Bound,
    pub value: String,
}

impl fmt::Display for RegionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ignoring non-numeric {} '{}' in region '{}'",
            self.bound, self.value, self.region
        )
    }
}

/// Parsed `[seqname][:[start][-[end]]]`.
///
/// `start`/`end` keep the user-facing 1-based inclusive values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub seqname: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl Region {
    /// Parse a region string, returning the dropped-bound warnings alongside.
    ///
    /// Accepted shapes: `seq`, `seq:pos` (start only), `seq:start-`,
    /// `seq:-end`, `seq:start-end`, and the same without `seq`.
    pub fn parse(spec: &str) -> Result<(Region, Vec<RegionWarning>), RegionError> {
        let invalid = |reason| RegionError::InvalidRegion {
            region: spec.to_string(),
            reason,
        };

        let text = spec.trim();
        if text.is_empty() {
            return Err(invalid("region is empty"));
        }

        let (seq_part, range_part) = match text.split_once(':') {
            Some((seq, range)) => (seq.trim(), Some(range.trim())),
            None => (text, None),
        };
        let seqname = (!seq_part.is_empty()).then(|| seq_part.to_string());

        let mut warnings = Vec::new();
        let (mut start, mut end) = (None, None);

        if let Some(range) = range_part.filter(|r| !r.is_empty()) {
            let (s, e) = match range.split_once('-') {
                Some((s, e)) => (s.trim(), e.trim()),
                None => (range, ""),
            };
            start = parse_bound(spec, s, Bound::Start, &mut warnings);
            end = parse_bound(spec, e, Bound::End, &mut warnings);
        }

        if start == Some(0) {
            return Err(invalid("start must be larger than 0"));
        }
        if end == Some(0) {
            return Err(invalid("end must be larger than 0"));
        }
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(invalid("start must be less than end"));
            }
        }
        if seqname.is_none() && start.is_none() && end.is_none() && warnings.is_empty() {
            return Err(invalid("region names neither a sequence nor a position"));
        }

        Ok((Region { seqname, start, end }, warnings))
    }

    /// 0-based inclusive lower bound.
    #[inline]
    pub fn start0(&self) -> Option<u64> {
        self.start.map(|s| s - 1)
    }

    /// 0-based exclusive upper bound (numerically the 1-based inclusive end).
    #[inline]
    pub fn end0(&self) -> Option<u64> {
        self.end
    }

    /// True if `iv` lies fully inside this region.
    pub fn contains(&self, iv: &Interval) -> bool {
        if let Some(seq) = &self.seqname {
            if seq != &iv.seqname {
                return false;
            }
        }
        if let Some(s) = self.start0() {
            if iv.start < s {
                return false;
            }
        }
        if let Some(e) = self.end0() {
            if iv.end > e {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(seq) = &self.seqname {
            f.write_str(seq)?;
        }
        if self.start.is_none() && self.end.is_none() {
            return Ok(());
        }
        f.write_str(":")?;
        if let Some(s) = self.start {
            write!(f, "{s}")?;
        }
        f.write_str("-")?;
        if let Some(e) = self.end {
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

fn parse_bound(
    spec: &str,
    raw: &str,
    bound: Bound,
    warnings: &mut Vec<RegionWarning>,
) -> Option<u64> {
    if raw.is_empty() {
        return None;
    }
    match raw.replace(',', "").parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warnings.push(RegionWarning {
                region: spec.to_string(),
                bound,
                value: raw.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strand;
    use rstest::rstest;

    fn region(s: &str) -> Region {
        Region::parse(s).unwrap().0
    }

    #[rstest]
    #[case("140:8523-9711", Some("140"), Some(8523), Some(9711))]
    #[case("140:8523-", Some("140"), Some(8523), None)]
    #[case("140:-9711", Some("140"), None, Some(9711))]
    #[case("140:8523", Some("140"), Some(8523), None)]
    #[case("140", Some("140"), None, None)]
    #[case(":10-20", None, Some(10), Some(20))]
    #[case("chr1:1,000-2,000", Some("chr1"), Some(1000), Some(2000))]
    fn parses_shapes(
        #[case] spec: &str,
        #[case] seq: Option<&str>,
        #[case] start: Option<u64>,
        #[case] end: Option<u64>,
    ) {
        let r = region(spec);
        assert_eq!(r.seqname.as_deref(), seq);
        assert_eq!(r.start, start);
        assert_eq!(r.end, end);
    }

    #[rstest]
    #[case("140:0-490", "start must be larger than 0")]
    #[case("140:5-0", "end must be larger than 0")]
    #[case("140:170-12", "start must be less than end")]
    #[case("", "region is empty")]
    #[case(":", "region names neither a sequence nor a position")]
    fn rejects_invalid(#[case] spec: &str, #[case] expected: &str) {
        match Region::parse(spec) {
            Err(RegionError::InvalidRegion { reason, .. }) => assert_eq!(reason, expected),
            other => panic!("expected InvalidRegion for {spec:?}, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_bound_is_dropped_with_warning() {
        let (r, warnings) = Region::parse("140:a-132").unwrap();
        assert_eq!(r.start, None);
        assert_eq!(r.end, Some(132));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].bound, Bound::Start);
        assert_eq!(warnings[0].value, "a");
        assert!(warnings[0].to_string().contains("non-numeric start 'a'"));
    }

    #[test]
    fn single_base_region_is_allowed() {
        let r = region("chr1:5-5");
        assert_eq!((r.start0(), r.end0()), (Some(4), Some(5)));
    }

    #[test]
    fn containment_is_exact_at_both_edges() {
        let r = region("140:8523-9711");
        assert!(r.contains(&Interval::new("140", 8522, 9711, Strand::Minus)));
        assert!(!r.contains(&Interval::new("140", 8521, 9711, Strand::Minus)));
        assert!(!r.contains(&Interval::new("140", 8522, 9712, Strand::Minus)));
        assert!(!r.contains(&Interval::new("141", 8522, 9711, Strand::Minus)));
    }

    #[test]
    fn sequence_only_region_matches_whole_sequence() {
        let r = region("381");
        assert!(r.contains(&Interval::new("381", 0, u64::MAX, Strand::Plus)));
        assert!(!r.contains(&Interval::new("140", 0, 1, Strand::Plus)));
    }

    #[test]
    fn positional_region_ignores_sequence() {
        let r = region(":100-200");
        assert!(r.contains(&Interval::new("any", 99, 200, Strand::Plus)));
    }

    #[test]
    fn display_round_trips() {
        for s in ["140:8523-9711", "140", "140:5-", "140:-9"] {
            assert_eq!(region(s).to_string(), s);
        }
    }
}
