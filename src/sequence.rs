//! Subsequence extraction from an indexed genome.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use bio::alphabets::dna;
use bio::io::fasta::IndexedReader;
use thiserror::Error;

use crate::model::Feature;
use crate::types::Strand;

/// FASTA line width used by [`write_fasta`].
pub const FASTA_WIDTH: usize = 60;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("chromosome name must be provided")]
    ChromosomeNotSpecified,

    #[error("position start and end must be provided")]
    PositionNotSpecified,

    #[error("start {start} is past end {end}")]
    InvertedRange { start: u64, end: u64 },

    #[error("FASTA error for '{target}': {message}")]
    Fasta { target: String, message: String },
}

/// Anything that can hand out a slice of a named sequence.
pub trait SequenceSource {
    /// Bases in `[start, end)` (0-based) of `chrom`, forward strand.
    fn fetch(&mut self, chrom: &str, start: u64, end: u64) -> Result<Vec<u8>, SequenceError>;
}

/// A FASTA file with a `.fai` index next to it.
pub struct IndexedFasta {
    reader: IndexedReader<File>,
}

impl IndexedFasta {
    /// Open `path`; the index is expected at `path.fai`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SequenceError> {
        let path = path.as_ref();
        let reader = IndexedReader::from_file(&path).map_err(|e| SequenceError::Fasta {
            target: path.display().to_string(),
            message: e.to_string(),
        })?;
        log::debug!("opened indexed FASTA {}", path.display());
        Ok(Self { reader })
    }

    /// Sequence names in index order.
    pub fn sequence_names(&self) -> Vec<String> {
        self.reader.index.sequences().into_iter().map(|s| s.name).collect()
    }
}

impl SequenceSource for IndexedFasta {
    fn fetch(&mut self, chrom: &str, start: u64, end: u64) -> Result<Vec<u8>, SequenceError> {
        let fasta_err = |e: std::io::Error| SequenceError::Fasta {
            target: format!("{chrom}:{start}-{end}"),
            message: e.to_string(),
        };
        let mut seq = Vec::with_capacity(end.saturating_sub(start) as usize);
        self.reader.fetch(chrom, start, end).map_err(fasta_err)?;
        self.reader.read(&mut seq).map_err(fasta_err)?;
        Ok(seq)
    }
}

/// Fetch `[start, end)` of `chrom`, reverse-complemented on the minus strand.
///
/// Missing arguments are reported rather than defaulted; a start of 0 is a
/// real position.
pub fn extract_sequence<S: SequenceSource + ?Sized>(
    source: &mut S,
    chrom: Option<&str>,
    start: Option<u64>,
    end: Option<u64>,
    strand: Strand,
) -> Result<String, SequenceError> {
    let chrom = chrom
        .filter(|c| !c.is_empty())
        .ok_or(SequenceError::ChromosomeNotSpecified)?;
    let (Some(start), Some(end)) = (start, end) else {
        return Err(SequenceError::PositionNotSpecified);
    };
    if start > end {
        return Err(SequenceError::InvertedRange { start, end });
    }

    let seq = source.fetch(chrom, start, end)?;
    let seq = match strand {
        Strand::Minus => dna::revcomp(&seq),
        Strand::Plus | Strand::Unknown => seq,
    };
    Ok(String::from_utf8_lossy(&seq).into_owned())
}

/// The bases a record covers, oriented by its strand.
pub fn feature_sequence<S: SequenceSource + ?Sized>(
    source: &mut S,
    feature: &Feature,
) -> Result<String, SequenceError> {
    let iv = &feature.interval;
    extract_sequence(source, Some(&iv.seqname), Some(iv.start), Some(iv.end), iv.strand)
}

/// FASTA header for a record: `>id seq:start-end(strand)`, 1-based closed.
pub fn fasta_header(feature: &Feature, end_included: bool) -> String {
    let (start, end) = feature.interval.to_one_based(end_included);
    let location = format!("{}:{}-{}({})", feature.seqname(), start, end, feature.strand());
    match &feature.id {
        Some(id) => format!(">{id} {location}"),
        None => format!(">{location}"),
    }
}

/// Write one FASTA record, wrapping the sequence at [`FASTA_WIDTH`].
pub fn write_fasta<W: Write>(out: &mut W, header: &str, seq: &str) -> std::io::Result<()> {
    writeln!(out, "{header}")?;
    for chunk in seq.as_bytes().chunks(FASTA_WIDTH) {
        out.write_all(chunk)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::io::parse_record_line;
    use std::collections::HashMap;

    struct InMemory(HashMap<String, Vec<u8>>);

    impl SequenceSource for InMemory {
        fn fetch(&mut self, chrom: &str, start: u64, end: u64) -> Result<Vec<u8>, SequenceError> {
            let seq = self.0.get(chrom).ok_or_else(|| SequenceError::Fasta {
                target: chrom.to_string(),
                message: "unknown sequence".into(),
            })?;
            seq.get(start as usize..end as usize)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| SequenceError::Fasta {
                    target: chrom.to_string(),
                    message: "out of bounds".into(),
                })
        }
    }

    fn genome() -> InMemory {
        InMemory(HashMap::from([("chr1".to_string(), b"AACCGGTTAC".to_vec())]))
    }

    #[test]
    fn plus_strand_is_verbatim() {
        let seq = extract_sequence(&mut genome(), Some("chr1"), Some(0), Some(4), Strand::Plus).unwrap();
        assert_eq!(seq, "AACC");
    }

    #[test]
    fn minus_strand_is_reverse_complemented() {
        let seq = extract_sequence(&mut genome(), Some("chr1"), Some(6), Some(10), Strand::Minus).unwrap();
        assert_eq!(seq, "GTAA");
    }

    #[test]
    fn zero_start_is_a_position() {
        assert!(extract_sequence(&mut genome(), Some("chr1"), Some(0), Some(0), Strand::Plus)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_arguments_are_reported() {
        let mut g = genome();
        assert!(matches!(
            extract_sequence(&mut g, None, Some(0), Some(4), Strand::Plus),
            Err(SequenceError::ChromosomeNotSpecified)
        ));
        assert!(matches!(
            extract_sequence(&mut g, Some(""), Some(0), Some(4), Strand::Plus),
            Err(SequenceError::ChromosomeNotSpecified)
        ));
        assert!(matches!(
            extract_sequence(&mut g, Some("chr1"), None, Some(4), Strand::Plus),
            Err(SequenceError::PositionNotSpecified)
        ));
        assert!(matches!(
            extract_sequence(&mut g, Some("chr1"), Some(1), None, Strand::Plus),
            Err(SequenceError::PositionNotSpecified)
        ));
        assert!(matches!(
            extract_sequence(&mut g, Some("chr1"), Some(5), Some(2), Strand::Plus),
            Err(SequenceError::InvertedRange { start: 5, end: 2 })
        ));
    }

    #[test]
    fn feature_sequence_uses_record_interval() {
        let f = parse_record_line("chr1\tsrc\texon\t3\t6\t.\t-\t.\tID=ex1", 1, true).unwrap();
        // [2, 6) is CCGG, its own reverse complement
        assert_eq!(feature_sequence(&mut genome(), &f).unwrap(), "CCGG");
        assert_eq!(fasta_header(&f, true), ">ex1 chr1:3-6(-)");
    }

    #[test]
    fn fasta_output_wraps() {
        let mut out = Vec::new();
        let seq = "A".repeat(FASTA_WIDTH + 5);
        write_fasta(&mut out, ">x", &seq).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].len(), FASTA_WIDTH);
        assert_eq!(lines[2], "AAAAA");
    }

    #[test]
    fn indexed_fasta_fetches_across_lines() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = dir.path().join("genome.fa");
        std::fs::write(&fasta, ">chr1\nACGTACGTAC\nGGTT\n>chr2\nTTTT\n").unwrap();
        let mut fai = std::fs::File::create(dir.path().join("genome.fa.fai")).unwrap();
        writeln!(fai, "chr1\t14\t6\t10\t11").unwrap();
        writeln!(fai, "chr2\t4\t28\t4\t5").unwrap();
        drop(fai);

        let mut genome = IndexedFasta::from_file(&fasta).unwrap();
        assert_eq!(genome.sequence_names(), vec!["chr1", "chr2"]);
        assert_eq!(genome.fetch("chr1", 8, 12).unwrap(), b"ACGG");
        let rc = extract_sequence(&mut genome, Some("chr2"), Some(0), Some(2), Strand::Minus).unwrap();
        assert_eq!(rc, "AA");
    }

    #[test]
    fn missing_index_is_fasta_error() {
        let dir = tempfile::tempdir().unwrap();
        let fasta = dir.path().join("genome.fa");
        std::fs::write(&fasta, ">chr1\nACGT\n").unwrap();
        assert!(matches!(
            IndexedFasta::from_file(&fasta),
            Err(SequenceError::Fasta { .. })
        ));
    }
}
