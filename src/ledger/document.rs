//! Ledger text codec.
//!
//! The ledger is a markdown file where every `## ` line opens a date group and
//! every `### ` line opens one booking entry inside the current group:
//!
//! ```text
//! ## 2026-02-15
//!
//! ### 12: _rid-b_
//! ...body...
//!
//! ## 2026-02-14
//!
//! ### 10: _rid-a_
//! ...body...
//! ```
//!
//! [`Document::parse`] and [`Document::serialize`] are inverses for any
//! document built through [`Document::upsert`](crate::ledger::merge).

use crate::error::LedgerError;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DATE_MARKER: &str = "## ";
pub const ENTRY_MARKER: &str = "### ";

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar date a new entry is filed under. Only valid dates can be
/// written, so every group the ledger gains reads back under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl FromStr for DateKey {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(raw.trim(), DATE_KEY_FORMAT)
            .map(Self)
            .map_err(|err| {
                LedgerError::InvalidDateKey(format!("`{raw}` is not YYYY-MM-DD: {err}"))
            })
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_KEY_FORMAT))
    }
}

/// One rendered booking entry. The first line is the header
/// `<sequence>: <record id>`; the rest is free-form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    sequence: u64,
    text: String,
}

impl TextBlock {
    /// Build a block from its parts using the `<seq>: _<rid>_` header form.
    /// Body lines that would read as ledger markers are escaped.
    pub fn compose(sequence: u64, record_id: &str, body: &str) -> Self {
        let rid = record_id.split_whitespace().collect::<Vec<_>>().join(" ");
        let header = format!("{sequence}: _{rid}_");
        if body.trim().is_empty() {
            return Self::from_lines(sequence, &header, std::iter::empty());
        }
        let lines = std::iter::once("").chain(body.lines());
        Self::from_lines(sequence, &header, lines)
    }

    /// Read a block back from text, taking the sequence from the first line.
    /// Returns `None` when that line is not `<integer>:...`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines();
        let header = lines.next()?.trim();
        let sequence = parse_header_sequence(header)?;
        Some(Self::from_lines(sequence, header, lines))
    }

    /// Body lines that would read as ledger markers are escaped.
    fn from_lines<'a>(sequence: u64, header: &str, body: impl Iterator<Item = &'a str>) -> Self {
        let mut text = header.to_string();
        for line in body {
            text.push('\n');
            if line.starts_with(DATE_MARKER) || line.starts_with(ENTRY_MARKER) {
                text.push('\\');
            }
            text.push_str(line);
        }
        text.truncate(text.trim_end().len());
        Self { sequence, text }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn header(&self) -> &str {
        self.text.lines().next().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for TextBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_header_sequence(header: &str) -> Option<u64> {
    let (raw, _) = header.split_once(':')?;
    raw.trim().parse::<u64>().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateGroup {
    entries: BTreeMap<u64, TextBlock>,
}

impl DateGroup {
    pub fn get(&self, sequence: u64) -> Option<&TextBlock> {
        self.entries.get(&sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ledger order: highest sequence first.
    pub fn iter_descending(&self) -> impl Iterator<Item = &TextBlock> {
        self.entries.values().rev()
    }

    pub(crate) fn insert(&mut self, block: TextBlock) -> Option<TextBlock> {
        self.entries.insert(block.sequence(), block)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    groups: BTreeMap<String, DateGroup>,
}

/// A segment of ledger text that [`Document::parse`] skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAnomaly {
    /// Text before the first date marker.
    Preamble { line: usize },
    /// A date marker with nothing after it.
    EmptyDateKey { line: usize },
    /// Text between a date line and its first entry marker.
    StrayText { date: String, line: usize },
    /// An entry whose header does not start with `<integer>:`.
    MalformedHeader {
        date: String,
        line: usize,
        header: String,
    },
    /// A date group that ended up with no entries.
    EmptyDateGroup { date: String, line: usize },
    /// The same sequence appeared twice under one date; the later block won.
    DuplicateSequence {
        date: String,
        line: usize,
        sequence: u64,
    },
}

impl ParseAnomaly {
    pub fn line(&self) -> usize {
        match self {
            Self::Preamble { line }
            | Self::EmptyDateKey { line }
            | Self::StrayText { line, .. }
            | Self::MalformedHeader { line, .. }
            | Self::EmptyDateGroup { line, .. }
            | Self::DuplicateSequence { line, .. } => *line,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Preamble { .. } => "preamble",
            Self::EmptyDateKey { .. } => "empty_date_key",
            Self::StrayText { .. } => "stray_text",
            Self::MalformedHeader { .. } => "malformed_header",
            Self::EmptyDateGroup { .. } => "empty_date_group",
            Self::DuplicateSequence { .. } => "duplicate_sequence",
        }
    }
}

impl fmt::Display for ParseAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preamble { line } => write!(f, "line {line}: text before first date header"),
            Self::EmptyDateKey { line } => write!(f, "line {line}: date header without a date"),
            Self::StrayText { date, line } => {
                write!(f, "line {line}: text outside any entry under {date}")
            }
            Self::MalformedHeader { date, line, header } => write!(
                f,
                "line {line}: entry header `{header}` under {date} has no sequence number"
            ),
            Self::EmptyDateGroup { date, line } => {
                write!(f, "line {line}: date {date} has no entries")
            }
            Self::DuplicateSequence {
                date,
                line,
                sequence,
            } => write!(
                f,
                "line {line}: sequence {sequence} repeated under {date}; later entry kept"
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub document: Document,
    pub anomalies: Vec<ParseAnomaly>,
}

struct Segment<'a> {
    first_line: usize,
    lines: Vec<&'a str>,
}

/// Split `lines` at every line starting with `marker`, stripping the marker.
/// The first returned segment holds whatever precedes the first marker and
/// has no marker of its own.
fn split_on_marker<'a>(lines: &[&'a str], first_line: usize, marker: &str) -> Vec<Segment<'a>> {
    let mut out = vec![Segment {
        first_line,
        lines: Vec::new(),
    }];
    for (offset, line) in lines.iter().enumerate() {
        if let Some(rest) = line.strip_prefix(marker) {
            out.push(Segment {
                first_line: first_line + offset,
                lines: vec![rest],
            });
        } else if let Some(current) = out.last_mut() {
            current.lines.push(line);
        }
    }
    out
}

fn is_blank(lines: &[&str]) -> bool {
    lines.iter().all(|line| line.trim().is_empty())
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode ledger text. Never fails: segments that cannot be understood
    /// are skipped and reported in [`ParseOutcome::anomalies`].
    pub fn parse(text: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome {
            document: Document::new(),
            anomalies: Vec::new(),
        };
        if text.trim().is_empty() {
            return outcome;
        }

        let lines = text.lines().collect::<Vec<_>>();
        let mut date_segments = split_on_marker(&lines, 1, DATE_MARKER).into_iter();

        if let Some(preamble) = date_segments.next()
            && !is_blank(&preamble.lines)
        {
            let line = preamble
                .lines
                .iter()
                .position(|l| !l.trim().is_empty())
                .map_or(preamble.first_line, |idx| preamble.first_line + idx);
            outcome.anomalies.push(ParseAnomaly::Preamble { line });
        }

        for segment in date_segments {
            let date = segment.lines[0].trim().to_string();
            if date.is_empty() {
                outcome.anomalies.push(ParseAnomaly::EmptyDateKey {
                    line: segment.first_line,
                });
                continue;
            }

            let mut entry_segments =
                split_on_marker(&segment.lines[1..], segment.first_line + 1, ENTRY_MARKER)
                    .into_iter();
            if let Some(stray) = entry_segments.next()
                && !is_blank(&stray.lines)
            {
                outcome.anomalies.push(ParseAnomaly::StrayText {
                    date: date.clone(),
                    line: stray.first_line,
                });
            }

            let group = outcome.document.groups.entry(date.clone()).or_default();
            for entry in entry_segments {
                let raw = entry.lines.join("\n");
                match TextBlock::parse(&raw) {
                    Some(block) => {
                        let sequence = block.sequence();
                        if group.insert(block).is_some() {
                            outcome.anomalies.push(ParseAnomaly::DuplicateSequence {
                                date: date.clone(),
                                line: entry.first_line,
                                sequence,
                            });
                        }
                    }
                    None => outcome.anomalies.push(ParseAnomaly::MalformedHeader {
                        date: date.clone(),
                        line: entry.first_line,
                        header: entry.lines[0].trim().to_string(),
                    }),
                }
            }

            if group.is_empty() {
                outcome.document.groups.remove(&date);
                outcome.anomalies.push(ParseAnomaly::EmptyDateGroup {
                    date,
                    line: segment.first_line,
                });
            }
        }

        outcome
    }

    /// Encode the document: dates newest first, entries highest sequence first.
    pub fn serialize(&self) -> String {
        let mut sections = Vec::new();
        for (date, group) in self.groups.iter().rev() {
            sections.push(format!("{DATE_MARKER}{date}"));
            for block in group.iter_descending() {
                sections.push(format!("{ENTRY_MARKER}{block}"));
            }
        }
        if sections.is_empty() {
            return String::new();
        }
        let mut out = sections.join("\n\n");
        out.push('\n');
        out
    }

    pub fn group(&self, date_key: &str) -> Option<&DateGroup> {
        self.groups.get(date_key)
    }

    #[cfg(test)]
    pub fn get(&self, date_key: &str, sequence: u64) -> Option<&TextBlock> {
        self.group(date_key)?.get(sequence)
    }

    /// Date keys in ledger order: newest first.
    pub fn dates_descending(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().rev().map(String::as_str)
    }

    pub fn date_count(&self) -> usize {
        self.groups.len()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.values().map(DateGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn group_mut(&mut self, date_key: DateKey) -> &mut DateGroup {
        self.groups.entry(date_key.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, ParseAnomaly, TextBlock};

    const TWO_DATES: &str = "## 2026-02-15\n\n### 5: _r5_\n\nfive\n\n## 2026-02-14\n\n### 12: _r12_\n\ntwelve\n+ line\n\n### 10: _r10_\n\nten\n";

    #[test]
    fn parse_empty_and_whitespace_text_yields_empty_document() {
        for text in ["", "   \n\n\t\n"] {
            let outcome = Document::parse(text);
            assert!(outcome.document.is_empty());
            assert!(outcome.anomalies.is_empty());
        }
    }

    #[test]
    fn parse_reads_dates_and_entries() {
        let outcome = Document::parse(TWO_DATES);
        assert!(outcome.anomalies.is_empty());
        let doc = outcome.document;
        assert_eq!(
            doc.dates_descending().collect::<Vec<_>>(),
            vec!["2026-02-15", "2026-02-14"]
        );
        assert_eq!(doc.entry_count(), 3);
        let block = doc.get("2026-02-14", 12).expect("entry 12");
        assert_eq!(block.header(), "12: _r12_");
        assert_eq!(block.as_str(), "12: _r12_\n\ntwelve\n+ line");
    }

    #[test]
    fn serialize_of_parsed_canonical_text_is_identical() {
        let doc = Document::parse(TWO_DATES).document;
        assert_eq!(doc.serialize(), TWO_DATES);
    }

    #[test]
    fn serialize_orders_unsorted_input() {
        let text = "## 2026-02-14\n\n### 10: a\n\n### 12: b\n\n## 2026-02-15\n\n### 1: c\n";
        let rendered = Document::parse(text).document.serialize();
        assert_eq!(
            rendered,
            "## 2026-02-15\n\n### 1: c\n\n## 2026-02-14\n\n### 12: b\n\n### 10: a\n"
        );
    }

    #[test]
    fn sequence_is_compared_numerically() {
        let text = "## 2026-02-14\n\n### 9: a\n\n### 100: b\n\n### 20: c\n";
        let doc = Document::parse(text).document;
        let order = doc
            .group("2026-02-14")
            .expect("group")
            .iter_descending()
            .map(TextBlock::sequence)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![100, 20, 9]);
    }

    #[test]
    fn malformed_header_is_dropped_and_reported() {
        let text = "## 2026-02-14\n\n### abc: _broken_\n\nbody\n\n### 7: _ok_\n\nfine\n";
        let outcome = Document::parse(text);
        assert_eq!(outcome.document.entry_count(), 1);
        assert!(outcome.document.get("2026-02-14", 7).is_some());
        assert_eq!(
            outcome.anomalies,
            vec![ParseAnomaly::MalformedHeader {
                date: "2026-02-14".to_string(),
                line: 3,
                header: "abc: _broken_".to_string(),
            }]
        );
    }

    #[test]
    fn header_without_colon_is_malformed() {
        let outcome = Document::parse("## 2026-02-14\n\n### 42\n");
        assert!(outcome.document.is_empty());
        assert_eq!(outcome.anomalies.len(), 2);
        assert_eq!(outcome.anomalies[0].kind(), "malformed_header");
        assert_eq!(outcome.anomalies[1].kind(), "empty_date_group");
    }

    #[test]
    fn empty_date_key_and_preamble_are_skipped() {
        let text = "# Bookings\n\n## \n\n### 1: x\n\n## 2026-02-14\n\n### 2: y\n";
        let outcome = Document::parse(text);
        assert_eq!(outcome.document.date_count(), 1);
        assert!(outcome.document.get("2026-02-14", 2).is_some());
        let kinds = outcome
            .anomalies
            .iter()
            .map(ParseAnomaly::kind)
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["preamble", "empty_date_key"]);
        assert_eq!(outcome.anomalies[0].line(), 1);
        assert_eq!(outcome.anomalies[1].line(), 3);
    }

    #[test]
    fn stray_text_before_first_entry_is_reported() {
        let outcome = Document::parse("## 2026-02-14\nnote to self\n### 3: z\n");
        assert_eq!(outcome.document.entry_count(), 1);
        assert_eq!(
            outcome.anomalies,
            vec![ParseAnomaly::StrayText {
                date: "2026-02-14".to_string(),
                line: 2,
            }]
        );
    }

    #[test]
    fn duplicate_dates_merge_and_duplicate_sequences_keep_the_later_block() {
        let text = "## 2026-02-14\n\n### 1: first\n\n## 2026-02-14\n\n### 1: second\n\n### 2: other\n";
        let outcome = Document::parse(text);
        let doc = &outcome.document;
        assert_eq!(doc.date_count(), 1);
        assert_eq!(doc.entry_count(), 2);
        assert_eq!(doc.get("2026-02-14", 1).expect("seq 1").as_str(), "1: second");
        assert_eq!(outcome.anomalies.len(), 1);
        assert_eq!(outcome.anomalies[0].kind(), "duplicate_sequence");
    }

    #[test]
    fn date_key_and_header_are_trimmed() {
        let outcome = Document::parse("##   2026-02-14  \n###   8 : _r_  \nbody\n");
        let block = outcome.document.get("2026-02-14", 8).expect("entry");
        assert_eq!(block.header(), "8 : _r_");
    }

    #[test]
    fn crlf_text_parses() {
        let outcome = Document::parse("## 2026-02-14\r\n\r\n### 4: _r_\r\n\r\nbody\r\n");
        assert!(outcome.anomalies.is_empty());
        let block = outcome.document.get("2026-02-14", 4).expect("entry");
        assert_eq!(block.as_str(), "4: _r_\n\nbody");
    }

    #[test]
    fn compose_builds_nested_header_and_collapses_record_id_whitespace() {
        let block = TextBlock::compose(31, "abc\ndef", "body\n\n");
        assert_eq!(block.sequence(), 31);
        assert_eq!(block.as_str(), "31: _abc def_\n\nbody");
        assert_eq!(TextBlock::parse(block.as_str()), Some(block));
    }

    #[test]
    fn parse_escapes_body_lines_that_look_like_markers() {
        let block = TextBlock::parse("10: _abc_\nnote\n### 11: ghost").expect("block");
        assert_eq!(block.as_str(), "10: _abc_\nnote\n\\### 11: ghost");
        assert_eq!(TextBlock::parse(block.as_str()), Some(block));
    }

    #[test]
    fn compose_escapes_body_lines_that_look_like_markers() {
        let block = TextBlock::compose(3, "r", "## not a date\n### not an entry\nplain");
        assert_eq!(
            block.as_str(),
            "3: _r_\n\n\\## not a date\n\\### not an entry\nplain"
        );
        let mut doc = Document::new();
        doc.upsert("2026-02-14".parse().expect("date"), block.clone());
        let reparsed = Document::parse(&doc.serialize());
        assert!(reparsed.anomalies.is_empty());
        assert_eq!(reparsed.document, doc);
    }

    #[test]
    fn parse_rejects_block_with_leading_blank_line() {
        assert_eq!(TextBlock::parse("\n10: _abc_"), None);
        assert_eq!(TextBlock::parse("ten: _abc_"), None);
    }

    #[test]
    fn empty_document_serializes_to_empty_string() {
        assert_eq!(Document::new().serialize(), "");
    }
}
