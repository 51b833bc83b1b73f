use crate::filter::{Filter, FilterError, FilterParam};
use crate::model::Feature;

/// Which column a [`ValueSetFilter`] looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureField {
    SeqId,
    Type,
    Source,
    Strand,
}

impl FeatureField {
    fn get(self, feature: &Feature) -> &str {
        match self {
            FeatureField::SeqId => feature.seqname(),
            FeatureField::Type => &feature.feature_type,
            FeatureField::Source => &feature.source,
            FeatureField::Strand => feature.strand().as_str(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            FeatureField::SeqId => "seqid",
            FeatureField::Type => "type",
            FeatureField::Source => "source",
            FeatureField::Strand => "strand",
        }
    }
}

/// Pass if the field equals any configured value (exact, case-sensitive).
#[derive(Debug, Clone)]
pub struct ValueSetFilter {
    field: FeatureField,
    values: Vec<String>,
}

impl ValueSetFilter {
    pub fn new(field: FeatureField, param: &FilterParam) -> Self {
        Self {
            field,
            values: param.values().into_iter().map(String::from).collect(),
        }
    }
}

impl Filter for ValueSetFilter {
    fn name(&self) -> &'static str {
        self.field.name()
    }

    fn matches(&self, feature: &Feature) -> bool {
        if self.values.is_empty() {
            return true;
        }
        let value = self.field.get(feature);
        self.values.iter().any(|v| v == value)
    }
}

/// Pass if every configured `key=value` pair is present with exactly that value.
#[derive(Debug, Clone)]
pub struct AttributesFilter {
    pairs: Vec<(String, String)>,
}

impl AttributesFilter {
    pub fn new(param: &FilterParam) -> Result<Self, FilterError> {
        let pairs = param
            .values()
            .into_iter()
            .map(|kv| {
                kv.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| FilterError::InvalidAttributePair(kv.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { pairs })
    }
}

impl Filter for AttributesFilter {
    fn name(&self) -> &'static str {
        "attributes"
    }

    fn matches(&self, feature: &Feature) -> bool {
        self.pairs
            .iter()
            .all(|(k, v)| feature.attr(k) == Some(v.as_str()))
    }
}
