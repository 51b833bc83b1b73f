use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

use crate::annotation::attributes::parse_attributes;
use crate::model::Feature;
use crate::types::{Interval, Strand};

/// `##key value` directives collected during one traversal.
pub type Metadata = IndexMap<String, String>;

/// Progress observer, called once per physical line with the cumulative
/// number of bytes consumed so far.
pub type ProgressFn = Box<dyn FnMut(u64)>;

static PRAGMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^##\s*(\S+)\s+(\S*)").expect("pragma pattern is valid")
});

/// Parsing errors for GTF/GFF3.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error while reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at line {line_no}: {reason}: {line}")]
    MalformedRecord {
        line_no: usize,
        reason: String,
        line: String,
    },
}

/// Where the lines come from.
///
/// A path is re-opened at the start of every traversal; an in-memory list is
/// simply walked again.
#[derive(Debug, Clone)]
pub enum LineSource {
    Path(PathBuf),
    Lines(Vec<String>),
}

/// Streaming reader for GFF3/GTF annotations.
///
/// Every call to [`GffReader::records`] starts a fresh traversal and clears
/// the collected [`Metadata`]. Iteration borrows the reader mutably, so one
/// reader cannot be walked by two consumers at the same time; create one
/// reader per consumer instead.
///
/// # Example
/// ```no_run
/// use gfftool::annotation::GffReader;
///
/// let mut reader = GffReader::from_path("genes.gff3", true);
/// for rec in reader.records().unwrap() {
///     let (feature, _raw) = rec.unwrap();
///     println!("{} {}-{}", feature.seqname(), feature.interval.start, feature.interval.end);
/// }
/// println!("{:?}", reader.metadata());
/// ```
pub struct GffReader {
    source: LineSource,
    end_included: bool,
    metadata: Metadata,
    progress: Option<ProgressFn>,
}

impl GffReader {
    pub fn new(source: LineSource, end_included: bool) -> Self {
        Self {
            source,
            end_included,
            metadata: Metadata::new(),
            progress: None,
        }
    }

    /// Read from a file; `.gz` paths are decompressed on the fly.
    pub fn from_path<P: AsRef<Path>>(path: P, end_included: bool) -> Self {
        Self::new(LineSource::Path(path.as_ref().to_path_buf()), end_included)
    }

    /// Read from in-memory lines. A line given without its `\n` gets one,
    /// so raw lines always come back terminated.
    pub fn from_lines<I, S>(lines: I, end_included: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines
            .into_iter()
            .map(|line| {
                let mut line: String = line.into();
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                line
            })
            .collect();
        Self::new(LineSource::Lines(lines), end_included)
    }

    pub fn set_progress(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }

    pub fn end_included(&self) -> bool {
        self.end_included
    }

    pub fn source(&self) -> &LineSource {
        &self.source
    }

    /// Pragmas seen by the most recent traversal.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Begin a traversal.
    ///
    /// Fails only if the backing file cannot be opened. The file handle is
    /// owned by the returned iterator and closed when it is dropped, whether
    /// or not it was consumed to the end.
    pub fn records(&mut self) -> Result<Records<'_>, ParseError> {
        let GffReader {
            source,
            end_included,
            metadata,
            progress,
        } = self;

        metadata.clear();

        let (input, origin) = match source {
            LineSource::Path(path) => (
                Input::Stream(open_bufread(path)?),
                path.display().to_string(),
            ),
            LineSource::Lines(lines) => (Input::Lines(lines.iter()), "<memory>".to_string()),
        };

        Ok(Records {
            input,
            origin,
            end_included: *end_included,
            metadata,
            progress: progress.as_mut(),
            bytes: 0,
            line_no: 0,
            done: false,
        })
    }
}

/// Open a path as `BufRead` (plain or gz).
pub(crate) fn open_bufread(path: &Path) -> Result<Box<dyn BufRead>, ParseError> {
    let f = File::open(path).map_err(|e| ParseError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let is_gz = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

enum Input<'a> {
    Stream(Box<dyn BufRead>),
    Lines(std::slice::Iter<'a, String>),
}

/// One traversal over a [`GffReader`].
///
/// Yields `(Feature, raw_line)` where `raw_line` is the exact input text,
/// trailing newline included. Stops after the first error.
pub struct Records<'a> {
    input: Input<'a>,
    /// file path, for error messages
    origin: String,
    end_included: bool,
    metadata: &'a mut Metadata,
    progress: Option<&'a mut ProgressFn>,
    bytes: u64,
    line_no: usize,
    done: bool,
}

impl Records<'_> {
    /// Pragmas collected so far in this traversal.
    pub fn metadata(&self) -> &Metadata {
        &*self.metadata
    }

    fn next_line(&mut self) -> Option<Result<String, ParseError>> {
        match &mut self.input {
            Input::Stream(reader) => {
                let mut buf = String::new();
                match reader.read_line(&mut buf) {
                    Ok(0) => None,
                    Ok(_) => Some(Ok(buf)),
                    Err(e) => Some(Err(ParseError::Io {
                        path: self.origin.clone(),
                        source: e,
                    })),
                }
            }
            Input::Lines(lines) => lines.next().cloned().map(Ok),
        }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<(Feature, String), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let raw = match self.next_line()? {
                Ok(raw) => raw,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            self.line_no += 1;
            self.bytes += raw.len() as u64;
            if let Some(progress) = self.progress.as_deref_mut() {
                progress(self.bytes);
            }

            if raw.trim_end_matches(&['\n', '\r'][..]).is_empty() {
                continue;
            }

            if raw.starts_with('#') {
                // embedded sequences follow, no more features
                if raw.starts_with("##") && raw[2..].trim() == "FASTA" {
                    self.done = true;
                    return None;
                }
                if let Some(caps) = PRAGMA.captures(&raw) {
                    let (key, value) = (&caps[1], &caps[2]);
                    log::debug!("pragma {key} = {value:?}");
                    self.metadata.insert(key.to_string(), value.to_string());
                }
                continue;
            }

            return match parse_record_line(&raw, self.line_no, self.end_included) {
                Ok(feature) => Some(Ok((feature, raw))),
                Err(e) => {
                    self.done = true;
                    Some(Err(e))
                }
            };
        }
    }
}

/// Parse a single non-comment line into a [`Feature`].
///
/// Column 9 takes everything after the eighth tab, so stray tabs inside the
/// attribute column are kept verbatim.
pub fn parse_record_line(
    line: &str,
    line_no: usize,
    end_included: bool,
) -> Result<Feature, ParseError> {
    let text = line.trim_end_matches(&['\n', '\r'][..]);
    let malformed = |reason: String| ParseError::MalformedRecord {
        line_no,
        reason,
        line: text.to_string(),
    };

    // seqname source feature start end score strand phase attributes
    let fields: Vec<&str> = text.splitn(9, '\t').collect();
    if fields.len() < 9 {
        return Err(malformed(format!(
            "expected 9 tab-separated columns, found {}",
            fields.len()
        )));
    }

    let start_1: u64 = fields[3]
        .parse()
        .map_err(|_| malformed(format!("invalid start '{}'", fields[3])))?;
    let end_1: u64 = fields[4]
        .parse()
        .map_err(|_| malformed(format!("invalid end '{}'", fields[4])))?;

    let strand = Strand::parse(fields[6])
        .ok_or_else(|| malformed(format!("invalid strand '{}'", fields[6])))?;

    let interval = Interval::from_one_based(fields[0], start_1, end_1, strand, end_included)
        .ok_or_else(|| malformed(format!("bad coordinates {}..{}", start_1, end_1)))?;

    let score = match fields[5] {
        "." => None,
        s => Some(
            s.parse::<f64>()
                .map_err(|_| malformed(format!("invalid score '{}'", s)))?,
        ),
    };

    let frame = match fields[7] {
        "." => None,
        s => {
            let p: u8 = s
                .parse()
                .map_err(|_| malformed(format!("invalid phase '{}'", s)))?;
            if p > 2 {
                return Err(malformed(format!("phase out of range '{}'", s)));
            }
            Some(p)
        }
    };

    let (dialect, attributes) = parse_attributes(fields[8]);

    Ok(Feature {
        id: Feature::identifier(&attributes, dialect),
        feature_type: fields[2].to_string(),
        source: fields[1].to_string(),
        score,
        frame,
        attributes,
        interval,
        dialect,
    })
}
