use std::collections::BTreeMap;

use serde::Serialize;

use crate::annotation::ParseError;
use crate::model::Feature;

/// Types whose length should be a whole number of codons.
const CODON_TYPES: [&str; 4] = ["exon", "CDS", "start_codon", "stop_codon"];

pub type Counts = BTreeMap<String, u64>;

/// Categorical tallies over one annotation file.
///
/// `closed_intervals`/`half_open_intervals` count, per codon-sized type, the
/// records whose written length `end - start + 1` is or is not divisible by
/// three. A file dominated by the latter was probably written with exclusive
/// ends. The reader is never reconfigured from this; it is a hint for the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub records: u64,
    pub seqids: Counts,
    pub sources: Counts,
    pub types: Counts,
    pub strands: Counts,
    pub phases: Counts,
    pub closed_intervals: Counts,
    pub half_open_intervals: Counts,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one record. `end_included` is the convention it was read with,
    /// so the codon check sees the coordinates as written in the file.
    pub fn add(&mut self, feature: &Feature, end_included: bool) {
        self.records += 1;
        bump(&mut self.seqids, feature.seqname());
        bump(&mut self.sources, &feature.source);
        bump(&mut self.types, &feature.feature_type);
        bump(&mut self.strands, feature.strand().as_str());
        bump(&mut self.phases, &feature.phase_str());

        let ty = feature.feature_type.as_str();
        if CODON_TYPES.contains(&ty) {
            let (start, end) = feature.interval.to_one_based(end_included);
            if (end - start + 1) % 3 == 0 {
                bump(&mut self.closed_intervals, ty);
            } else {
                bump(&mut self.half_open_intervals, ty);
            }
        }
    }

    /// Summarise a whole record stream; the first parse error aborts.
    pub fn from_records<I>(records: I, end_included: bool) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = Result<(Feature, String), ParseError>>,
    {
        let mut summary = Self::new();
        for rec in records {
            let (feature, _) = rec?;
            summary.add(&feature, end_included);
        }
        Ok(summary)
    }

    /// Closed-end convention looks more likely than half-open.
    pub fn favours_closed_intervals(&self) -> bool {
        let closed: u64 = self.closed_intervals.values().sum();
        let half_open: u64 = self.half_open_intervals.values().sum();
        closed >= half_open
    }
}

fn bump(counts: &mut Counts, key: &str) {
    *counts.entry(key.to_string()).or_insert(0) += 1;
}
