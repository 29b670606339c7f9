//! Tagged-text corpus parsing.
//!
//! A corpus is a stream of lines in which documents are delimited by a
//! begin-marker (`<DOC>`) and an end-marker (`</DOC>`). [`DocumentReader`]
//! lazily yields the raw body of each completed document, and
//! [`FieldExtractor`] pulls named `<FIELD>...</FIELD>` values out of a body.
//! Markers and tags match case-insensitively, and a field may span lines.

use crate::config::Schema;
use crate::error::ParseError;
use crate::Fields;
use regex::Regex;
use std::collections::VecDeque;
use std::io::{BufRead, Lines};

pub const DOC_BEGIN: &str = "<DOC>";
pub const DOC_END: &str = "</DOC>";

/// Text found between a begin-marker and its end-marker, markers excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// 1-based line of the begin-marker.
    pub line: usize,
    pub body: String,
}

struct OpenDocument {
    line: usize,
    body: String,
}

/// Lazy iterator over the documents of a tagged stream.
///
/// Malformed input yields a [`ParseError`] in place of the affected document
/// and scanning resumes at the next begin-marker; content scanned for the
/// failed document is discarded.
pub struct DocumentReader<R> {
    lines: Lines<R>,
    line_no: usize,
    begin: String,
    end: String,
    open: Option<OpenDocument>,
    ready: VecDeque<Result<RawDocument, ParseError>>,
    finished: bool,
}

impl<R: BufRead> DocumentReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_markers(reader, DOC_BEGIN, DOC_END)
    }

    pub fn with_markers(reader: R, begin: &str, end: &str) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            begin: begin.to_ascii_lowercase(),
            end: end.to_ascii_lowercase(),
            open: None,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    fn scan_line(&mut self, line: &str) {
        let folded = line.to_ascii_lowercase();
        let mut pos = 0;
        while pos <= line.len() {
            let rest = &folded[pos..];
            let next_begin = rest.find(&self.begin);
            let next_end = rest.find(&self.end);
            match self.open.take() {
                None => match (next_begin, next_end) {
                    (Some(b), Some(e)) if e < b => {
                        self.ready.push_back(Err(ParseError::Stray { line: self.line_no }));
                        pos += e + self.end.len();
                    }
                    (Some(b), _) => {
                        self.open = Some(OpenDocument { line: self.line_no, body: String::new() });
                        pos += b + self.begin.len();
                    }
                    (None, Some(e)) => {
                        self.ready.push_back(Err(ParseError::Stray { line: self.line_no }));
                        pos += e + self.end.len();
                    }
                    (None, None) => return,
                },
                Some(mut doc) => match (next_begin, next_end) {
                    (Some(b), e) if e.map_or(true, |e| b < e) => {
                        self.ready.push_back(Err(ParseError::Nested { line: doc.line, next: self.line_no }));
                        self.open = Some(OpenDocument { line: self.line_no, body: String::new() });
                        pos += b + self.begin.len();
                    }
                    (_, Some(e)) => {
                        doc.body.push_str(&line[pos..pos + e]);
                        self.ready.push_back(Ok(RawDocument { line: doc.line, body: doc.body }));
                        pos += e + self.end.len();
                    }
                    _ => {
                        doc.body.push_str(&line[pos..]);
                        doc.body.push('\n');
                        self.open = Some(doc);
                        return;
                    }
                },
            }
        }
    }
}

impl<R: BufRead> Iterator for DocumentReader<R> {
    type Item = Result<RawDocument, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some(Ok(line)) => {
                    self.line_no += 1;
                    self.scan_line(&line);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.open = None;
                    return Some(Err(ParseError::Io(e)));
                }
                None => {
                    self.finished = true;
                    if let Some(doc) = self.open.take() {
                        return Some(Err(ParseError::Unterminated { line: doc.line }));
                    }
                }
            }
        }
    }
}

/// Extracts the declared fields of a schema from a document body.
pub struct FieldExtractor {
    fields: Vec<(String, bool, Regex)>,
}

impl FieldExtractor {
    pub fn new(schema: &Schema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|spec| {
                let tag = regex::escape(&spec.name);
                let re = Regex::new(&format!(r"(?is)<{tag}>(.+?)</{tag}>")).expect("escaped tag is a valid regex");
                (spec.name.clone(), spec.required, re)
            })
            .collect();
        Self { fields }
    }

    /// Every match of `<name>...</name>`, trimmed and space-joined. A field
    /// with no matches is the empty string.
    pub fn field(re: &Regex, body: &str) -> String {
        re.captures_iter(body)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn extract(&self, doc: &RawDocument) -> Result<Fields, ParseError> {
        let mut out = Fields::new();
        for (name, required, re) in &self.fields {
            let value = Self::field(re, &doc.body);
            if *required && value.is_empty() {
                return Err(ParseError::MissingField { line: doc.line, field: name.clone() });
            }
            out.insert(name.clone(), value);
        }
        Ok(out)
    }
}

/// Parses a tagged stream into field maps, one per well-formed document.
pub struct CorpusParser {
    extractor: FieldExtractor,
}

impl CorpusParser {
    pub fn new(schema: &Schema) -> Self {
        Self { extractor: FieldExtractor::new(schema) }
    }

    pub fn documents<'a, R: BufRead + 'a>(&'a self, reader: R) -> impl Iterator<Item = Result<Fields, ParseError>> + 'a {
        DocumentReader::new(reader).map(move |raw| raw.and_then(|doc| self.extractor.extract(&doc)))
    }

    /// Well-formed documents only; every skipped document is logged.
    pub fn parse_lossy<R: BufRead>(&self, reader: R) -> (Vec<Fields>, usize) {
        let mut docs = Vec::new();
        let mut skipped = 0;
        for item in self.documents(reader) {
            match item {
                Ok(fields) => docs.push(fields),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(error = %e, "skipping malformed document");
                }
            }
        }
        (docs, skipped)
    }
}
