//! GFF3 to GTF projection.
//!
//! GTF wants every record to carry `gene_id` and `transcript_id`; GFF3 spells
//! the same hierarchy through `ID`/`Parent` links such as
//! `Parent=transcript:ENST0001`. [`GtfProjector`] walks the stream once and
//! fills in the missing ids, remembering which gene every transcript hangs
//! off. Records must come parents-first.

use std::collections::HashMap;
use std::io::Write;

use indexmap::IndexMap;
use thiserror::Error;

use crate::annotation::attributes::encode_gtf;
use crate::annotation::{Attributes, ParseError};
use crate::model::Feature;

/// Feature types whose own `ID` names a transcript.
const RNA_TYPES: [&str; 3] = ["mRNA", "tRNA", "rRNA"];

/// Log a progress line every this many converted records.
const LOG_EVERY: u64 = 100_000;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("no gene known for transcript '{transcript_id}' (its gene must appear earlier in the file)")]
    MissingLineage { transcript_id: String },

    #[error("exon at {seqname}:{start}-{end} must carry both gene_id and transcript_id")]
    IncompleteExon { seqname: String, start: u64, end: u64 },

    #[error("{feature_type} record at {seqname}:{start} has no '{attribute}' attribute")]
    MissingAttribute {
        feature_type: String,
        attribute: &'static str,
        seqname: String,
        start: u64,
    },

    #[error("invalid type mapping '{0}': expected old:new")]
    InvalidTypeMapping(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("writing GTF output: {0}")]
    Io(#[from] std::io::Error),
}

/// Knobs for one conversion pass.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Types whose prefix is kept on ids, e.g. `transcript` keeps
    /// `transcript:T1` instead of `T1`.
    pub id_prefixes: Vec<String>,
    /// Feature type renames applied before output.
    pub type_mapping: IndexMap<String, String>,
    /// Separator between a type prefix and the bare id in `ID`/`Parent`.
    pub type_delimiter: String,
    /// Coordinate convention the records were read with; output undoes it.
    pub end_included: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            id_prefixes: Vec::new(),
            type_mapping: IndexMap::new(),
            type_delimiter: ":".to_string(),
            end_included: true,
        }
    }
}

/// Parse `old:new` rename specs.
pub fn parse_type_mapping<I, S>(specs: I) -> Result<IndexMap<String, String>, ConvertError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    specs
        .into_iter()
        .map(|spec| {
            let spec = spec.as_ref();
            match spec.split(':').collect::<Vec<_>>()[..] {
                [old, new] if !old.is_empty() && !new.is_empty() => {
                    Ok((old.to_string(), new.to_string()))
                }
                _ => Err(ConvertError::InvalidTypeMapping(spec.to_string())),
            }
        })
        .collect()
}

/// Split `type<delim>id` at the first delimiter; no delimiter means no type.
pub fn split_prefix<'a>(value: &'a str, delimiter: &str) -> (&'a str, &'a str) {
    match value.split_once(delimiter) {
        Some((prefix, id)) => (prefix, id),
        None => ("", value),
    }
}

/// Rewrites records into GTF lines, one conversion pass per instance.
#[derive(Debug)]
pub struct GtfProjector {
    options: ConvertOptions,
    /// bare transcript id -> gene id as it will be written
    transcript_gene: HashMap<String, String>,
}

impl GtfProjector {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            transcript_gene: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Number of transcript to gene links seen so far.
    pub fn known_transcripts(&self) -> usize {
        self.transcript_gene.len()
    }

    /// Produce the GTF line (newline included) for one record.
    ///
    /// The record itself is left alone; ids are filled in on a copy of its
    /// attributes. The score is rendered from the parsed value; use
    /// [`GtfProjector::project_record`] to keep the text as it was read.
    pub fn project(&mut self, feature: &Feature) -> Result<String, ConvertError> {
        self.render(feature, &feature.score_str())
    }

    /// Like [`GtfProjector::project`], with the score column copied from the
    /// record's raw input line.
    pub fn project_record(&mut self, feature: &Feature, raw: &str) -> Result<String, ConvertError> {
        match raw.splitn(9, '\t').nth(5) {
            Some(score) => self.render(feature, score),
            None => self.project(feature),
        }
    }

    fn render(&mut self, feature: &Feature, score: &str) -> Result<String, ConvertError> {
        let delim = self.options.type_delimiter.as_str();
        let mut attrs: Attributes = feature.attributes.clone();

        if RNA_TYPES.contains(&feature.feature_type.as_str()) && !attrs.contains_key("transcript_id")
        {
            let id = own_id(feature, &attrs)?;
            let bare = split_prefix(id, delim).1.to_string();
            attrs.insert("transcript_id".to_string(), bare);
        }

        if let Some(parent) = attrs.get("Parent").cloned() {
            let (parent_type, parent_id) = split_prefix(&parent, delim);
            let full_id = if self.keeps_prefix(parent_type) {
                parent.clone()
            } else {
                parent_id.to_string()
            };
            match parent_type {
                "transcript" | "rna" => {
                    attrs.insert("transcript_id".to_string(), full_id);
                }
                "gene" => {
                    if let Some(tx) = attrs.get("transcript_id") {
                        let key = split_prefix(tx, delim).1.to_string();
                        self.transcript_gene.insert(key, full_id.clone());
                    }
                    attrs.insert("gene_id".to_string(), full_id);
                }
                _ => {}
            }
        }

        if !attrs.contains_key("gene_id") {
            if feature.feature_type == "gene" {
                let id = own_id(feature, &attrs)?;
                let bare = split_prefix(id, delim).1.to_string();
                attrs.insert("gene_id".to_string(), bare);
            } else if let Some(tx) = attrs.get("transcript_id") {
                let key = split_prefix(tx, delim).1;
                let gene = self
                    .transcript_gene
                    .get(key)
                    .cloned()
                    .ok_or_else(|| ConvertError::MissingLineage {
                        transcript_id: tx.clone(),
                    })?;
                attrs.insert("gene_id".to_string(), gene);
            }
        }

        for prefix in &self.options.id_prefixes {
            let key = format!("{prefix}_id");
            if let Some(value) = attrs.get_mut(&key) {
                if !value.starts_with(prefix.as_str()) {
                    *value = format!("{prefix}{delim}{value}");
                }
            }
        }

        let feature_type = self
            .options
            .type_mapping
            .get(&feature.feature_type)
            .unwrap_or(&feature.feature_type);

        let (start, end) = feature.interval.to_one_based(self.options.end_included);

        if feature_type == "exon"
            && !(attrs.contains_key("gene_id") && attrs.contains_key("transcript_id"))
        {
            return Err(ConvertError::IncompleteExon {
                seqname: feature.seqname().to_string(),
                start,
                end,
            });
        }

        Ok(format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            feature.seqname(),
            feature.source,
            feature_type,
            start,
            end,
            score,
            feature.strand(),
            feature.phase_str(),
            encode_gtf(&attrs),
        ))
    }

    fn keeps_prefix(&self, parent_type: &str) -> bool {
        self.options.id_prefixes.iter().any(|p| p == parent_type)
    }
}

fn own_id<'a>(feature: &Feature, attrs: &'a Attributes) -> Result<&'a str, ConvertError> {
    attrs
        .get("ID")
        .map(String::as_str)
        .ok_or_else(|| ConvertError::MissingAttribute {
            feature_type: feature.feature_type.clone(),
            attribute: "ID",
            seqname: feature.seqname().to_string(),
            start: feature.interval.start + 1,
        })
}

/// Convert a whole record stream, writing GTF lines to `out`.
///
/// Stops at the first parse or conversion error. Returns the number of
/// records written.
pub fn convert_records<I, W>(
    records: I,
    out: &mut W,
    options: ConvertOptions,
) -> Result<u64, ConvertError>
where
    I: IntoIterator<Item = Result<(Feature, String), ParseError>>,
    W: Write,
{
    let mut projector = GtfProjector::new(options);
    let mut n = 0u64;
    for rec in records {
        let (feature, raw) = rec?;
        out.write_all(projector.project_record(&feature, &raw)?.as_bytes())?;
        n += 1;
        if n % LOG_EVERY == 0 {
            log::info!("{n} GFF lines processed");
        }
    }
    log::debug!(
        "converted {n} records, {} transcript-gene links",
        projector.known_transcripts()
    );
    Ok(n)
}
