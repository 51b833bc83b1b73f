use std::path::Path;

use crate::annotation::io::{GffReader, ProgressFn};

/// High-level builder for creating a [`GffReader`].
///
/// - chooses the end-coordinate convention
/// - optionally attaches a progress observer
/// - builds a reader over a file path (re-opened per traversal) or over lines
pub struct ReaderBuilder {
    pub end_included: bool,
    progress: Option<ProgressFn>,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderBuilder {
    /// Start with the closed-end convention, the common reading of GFF/GTF.
    pub fn new() -> Self {
        Self {
            end_included: true,
            progress: None,
        }
    }

    /// Convenience: `false` treats column 5 as one past the last base.
    pub fn end_included(mut self, end_included: bool) -> Self {
        self.end_included = end_included;
        self
    }

    /// Convenience: observe cumulative bytes consumed, once per line.
    pub fn progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(u64) + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    /// Reader over a file path.
    ///
    /// - If path ends with `.gz`, uses the gzip decoder.
    /// - Otherwise reads as plain text.
    pub fn build_from_path<P: AsRef<Path>>(self, path: P) -> GffReader {
        let end_included = self.end_included;
        self.finish(GffReader::from_path(path, end_included))
    }

    /// Reader over in-memory lines; iterating twice walks the same lines.
    pub fn build_from_lines<I, S>(self, lines: I) -> GffReader
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let end_included = self.end_included;
        self.finish(GffReader::from_lines(lines, end_included))
    }

    fn finish(self, mut reader: GffReader) -> GffReader {
        if let Some(progress) = self.progress {
            reader.set_progress(progress);
        }
        reader
    }
}

// -------------------- tests --------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const GTF: &str = "\
chr1\tsrc\texon\t101\t150\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
chr1\tsrc\texon\t201\t250\t.\t+\t.\tgene_id \"G1\"; transcript_id \"T1\";
";

    #[test]
    fn builder_defaults_to_closed_ends() {
        let mut reader = ReaderBuilder::new().build_from_lines(GTF.lines());
        assert!(reader.end_included());

        let recs: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].0.interval.end, 150);
    }

    #[test]
    fn builder_half_open_shifts_end() {
        let mut reader = ReaderBuilder::new()
            .end_included(false)
            .build_from_lines(GTF.lines());

        let recs: Vec<_> = reader.records().unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(recs[0].0.interval.start, 100);
        assert_eq!(recs[0].0.interval.end, 149);
    }

    #[test]
    fn builder_progress_sees_every_line() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);

        let lines: Vec<String> = GTF.split_inclusive('\n').map(String::from).collect();
        let mut reader = ReaderBuilder::new()
            .progress(move |bytes| sink.borrow_mut().push(bytes))
            .build_from_lines(lines.clone());

        let n = reader.records().unwrap().count();
        assert_eq!(n, 2);

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], lines[0].len() as u64);
        assert_eq!(calls[1], (lines[0].len() + lines[1].len()) as u64);
    }
}
