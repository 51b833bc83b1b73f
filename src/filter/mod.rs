//! Record filters.
//!
//! Each filter kind is built from one [`FilterParam`] (absent, a single
//! string, or a list of strings) and an empty parameter always gives a
//! filter that lets everything through. A [`FilterChain`] holds only the
//! kinds named in its [`FilterParams`] and passes a record iff every filter
//! passes it.

pub mod expression;
pub mod region;
pub mod simple;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::ParseError;
use crate::model::Feature;
use crate::region::RegionError;

pub use expression::{Expression, ExpressionError, ExpressionFilter};
pub use region::RegionFilter;
pub use simple::{AttributesFilter, FeatureField, ValueSetFilter};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown filter '{0}' (expected one of: seqid, type, source, strand, attributes, expression, region)")]
    UnknownFilter(String),

    #[error("invalid attribute filter '{0}': expected key=value")]
    InvalidAttributePair(String),

    #[error("invalid expression '{expression}': {source}")]
    InvalidExpression {
        expression: String,
        #[source]
        source: ExpressionError,
    },

    #[error(transparent)]
    Region(#[from] RegionError),
}

/// A predicate over one record.
pub trait Filter {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn matches(&self, feature: &Feature) -> bool;
}

/// Configuration value for one filter kind.
///
/// Deserialises from `null`, `"value"` or `["a", "b"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterParam {
    #[default]
    Empty,
    One(String),
    Many(Vec<String>),
}

impl FilterParam {
    /// Configured values; empty strings are dropped so that `""`, `[]` and
    /// `null` all mean "not set".
    pub fn values(&self) -> Vec<&str> {
        let values: Vec<&str> = match self {
            FilterParam::Empty => Vec::new(),
            FilterParam::One(s) => vec![s.as_str()],
            FilterParam::Many(v) => v.iter().map(String::as_str).collect(),
        };
        values.into_iter().filter(|s| !s.is_empty()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// Append values, turning the parameter into a list.
    pub fn extend<I, S>(&mut self, more: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all: Vec<String> = self.values().into_iter().map(String::from).collect();
        all.extend(more.into_iter().map(Into::into));
        *self = FilterParam::Many(all);
    }
}

impl From<&str> for FilterParam {
    fn from(s: &str) -> Self {
        FilterParam::One(s.to_string())
    }
}

impl From<String> for FilterParam {
    fn from(s: String) -> Self {
        FilterParam::One(s)
    }
}

impl From<Vec<String>> for FilterParam {
    fn from(v: Vec<String>) -> Self {
        FilterParam::Many(v)
    }
}

impl From<Vec<&str>> for FilterParam {
    fn from(v: Vec<&str>) -> Self {
        FilterParam::Many(v.into_iter().map(String::from).collect())
    }
}

impl<T: Into<FilterParam>> From<Option<T>> for FilterParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

/// Filter configuration keyed by filter name, e.g. loaded from JSON:
/// `{"type": ["exon", "CDS"], "region": "chr1:100-200"}`.
pub type FilterParams = IndexMap<String, FilterParam>;

/// The recognised filter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    SeqId,
    Type,
    Source,
    Strand,
    Attributes,
    Expression,
    Region,
}

impl FilterKind {
    pub const ALL: [FilterKind; 7] = [
        FilterKind::SeqId,
        FilterKind::Type,
        FilterKind::Source,
        FilterKind::Strand,
        FilterKind::Attributes,
        FilterKind::Expression,
        FilterKind::Region,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::SeqId => "seqid",
            FilterKind::Type => "type",
            FilterKind::Source => "source",
            FilterKind::Strand => "strand",
            FilterKind::Attributes => "attributes",
            FilterKind::Expression => "expression",
            FilterKind::Region => "region",
        }
    }

    /// Construct the filter for this kind from its parameter.
    pub fn build(self, param: &FilterParam) -> Result<Box<dyn Filter>, FilterError> {
        let filter: Box<dyn Filter> = match self {
            FilterKind::SeqId => Box::new(ValueSetFilter::new(FeatureField::SeqId, param)),
            FilterKind::Type => Box::new(ValueSetFilter::new(FeatureField::Type, param)),
            FilterKind::Source => Box::new(ValueSetFilter::new(FeatureField::Source, param)),
            FilterKind::Strand => Box::new(ValueSetFilter::new(FeatureField::Strand, param)),
            FilterKind::Attributes => Box::new(AttributesFilter::new(param)?),
            FilterKind::Expression => Box::new(ExpressionFilter::new(param)?),
            FilterKind::Region => Box::new(RegionFilter::new(param)?),
        };
        Ok(filter)
    }
}

impl FromStr for FilterKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| FilterError::UnknownFilter(s.to_string()))
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered conjunction of filters.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
    warnings: Vec<String>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one filter per configured key, in configuration order.
    ///
    /// Every construction error (unknown key, bad attribute pair, bad
    /// expression, invalid region) surfaces here, before any record is read.
    pub fn from_params(params: &FilterParams) -> Result<Self, FilterError> {
        let mut chain = Self::new();
        for (key, param) in params {
            let kind: FilterKind = key.parse()?;
            if kind == FilterKind::Region {
                let filter = RegionFilter::new(param)?;
                chain
                    .warnings
                    .extend(filter.warnings().iter().map(ToString::to_string));
                chain.push(Box::new(filter));
            } else {
                chain.push(kind.build(param)?);
            }
        }
        log::debug!(
            "filter chain: [{}]",
            chain.filters.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ")
        );
        Ok(chain)
    }

    /// Add a filter at the end of the chain.
    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Non-fatal problems found while building (dropped region bounds).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        self.filters.iter().all(|f| f.matches(feature))
    }

    /// Keep only matching records of a stream; errors pass through untouched.
    pub fn select<'c, I>(
        &'c self,
        records: I,
    ) -> impl Iterator<Item = Result<(Feature, String), ParseError>> + 'c
    where
        I: Iterator<Item = Result<(Feature, String), ParseError>> + 'c,
    {
        records.filter(move |rec| match rec {
            Ok((feature, _)) => self.matches(feature),
            Err(_) => true,
        })
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field(
                "filters",
                &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .field("warnings", &self.warnings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::io::parse_record_line;

    fn feature(line: &str) -> Feature {
        parse_record_line(line, 1, true).unwrap()
    }

    fn params(pairs: &[(&str, FilterParam)]) -> FilterParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    const CDS: &str =
        "140\tTwinscan\tCDS\t66996\t66999\t.\t-\t1\tgene_id \"140.000\"; transcript_id \"140.000.1\"; rank \"11\"";

    #[test]
    fn param_forms_are_uniform() {
        assert!(FilterParam::Empty.is_empty());
        assert!(FilterParam::from("").is_empty());
        assert!(FilterParam::Many(vec![]).is_empty());
        assert_eq!(FilterParam::from("CDS").values(), vec!["CDS"]);
        assert_eq!(FilterParam::from(vec!["CDS"]).values(), vec!["CDS"]);
        assert_eq!(FilterParam::from(None::<String>), FilterParam::Empty);
    }

    #[test]
    fn param_deserialises_from_json() {
        let p: FilterParams =
            serde_json::from_str(r#"{"seqid": null, "type": "CDS", "source": ["a", "b"]}"#)
                .unwrap();
        assert_eq!(p["seqid"], FilterParam::Empty);
        assert_eq!(p["type"], FilterParam::One("CDS".into()));
        assert_eq!(p["source"], FilterParam::Many(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn extend_merges_values() {
        let mut p = FilterParam::from("exon");
        p.extend(["CDS"]);
        assert_eq!(p.values(), vec!["exon", "CDS"]);
    }

    #[test]
    fn empty_configuration_is_identity() {
        let chain = FilterChain::from_params(&FilterParams::new()).unwrap();
        assert!(chain.is_empty());
        assert!(chain.matches(&feature(CDS)));
    }

    #[test]
    fn every_kind_with_empty_param_passes() {
        let f = feature(CDS);
        for kind in FilterKind::ALL {
            for param in [FilterParam::Empty, FilterParam::from(""), FilterParam::Many(vec![])] {
                let filter = kind.build(&param).unwrap();
                assert!(filter.matches(&f), "{kind} with {param:?}");
            }
        }
    }

    #[test]
    fn chain_is_a_conjunction() {
        let f = feature(CDS);
        let pass = FilterChain::from_params(&params(&[
            ("type", "CDS".into()),
            ("strand", "-".into()),
            ("attributes", vec!["rank=11"].into()),
        ]))
        .unwrap();
        assert_eq!(pass.len(), 3);
        assert!(pass.matches(&f));

        let fail = FilterChain::from_params(&params(&[
            ("type", "CDS".into()),
            ("strand", "+".into()),
        ]))
        .unwrap();
        assert!(!fail.matches(&f));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = FilterChain::from_params(&params(&[("colour", "red".into())])).unwrap_err();
        assert!(matches!(err, FilterError::UnknownFilter(k) if k == "colour"));
    }

    #[test]
    fn invalid_region_fails_at_construction() {
        let err = FilterChain::from_params(&params(&[("region", "140:170-12".into())])).unwrap_err();
        assert!(matches!(err, FilterError::Region(RegionError::InvalidRegion { .. })));
    }

    #[test]
    fn region_warnings_surface_on_the_chain() {
        let chain = FilterChain::from_params(&params(&[("region", "140:a-132".into())])).unwrap();
        assert_eq!(chain.warnings().len(), 1);
    }

    #[test]
    fn select_passes_errors_through() {
        let chain = FilterChain::from_params(&params(&[("type", "exon".into())])).unwrap();
        let records = vec![
            Ok((feature(CDS), CDS.to_string())),
            Err(ParseError::MalformedRecord {
                line_no: 2,
                reason: "x".into(),
                line: "x".into(),
            }),
        ];
        let out: Vec<_> = chain.select(records.into_iter()).collect();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    struct LongerThan(u64);

    impl Filter for LongerThan {
        fn name(&self) -> &'static str {
            "longer-than"
        }

        fn matches(&self, feature: &Feature) -> bool {
            feature.interval.len() > self.0
        }
    }

    #[test]
    fn custom_filters_can_be_pushed() {
        let mut chain = FilterChain::new();
        chain.push(Box::new(LongerThan(3)));
        assert!(chain.matches(&feature(CDS)));
        chain.push(Box::new(LongerThan(4)));
        assert!(!chain.matches(&feature(CDS)));
    }
}
