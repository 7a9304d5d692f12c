use crate::ledger::document::{DateKey, Document, TextBlock};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

impl UpsertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Replaced => "replaced",
            Self::Unchanged => "unchanged",
        }
    }
}

impl Document {
    /// Insert `block` under `date_key`, replacing any entry with the same
    /// sequence number. Ordering is owned by the underlying maps, so the
    /// result is sorted no matter the order of calls.
    pub fn upsert(&mut self, date_key: DateKey, block: TextBlock) -> UpsertOutcome {
        let group = self.group_mut(date_key);
        if group.get(block.sequence()) == Some(&block) {
            return UpsertOutcome::Unchanged;
        }
        match group.insert(block) {
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Inserted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UpsertOutcome;
    use crate::ledger::document::{DateKey, Document, TextBlock};

    fn upsert(mut doc: Document, date_key: DateKey, block: TextBlock) -> Document {
        doc.upsert(date_key, block);
        doc
    }

    fn block(text: &str) -> TextBlock {
        TextBlock::parse(text).expect("valid block")
    }

    fn day(raw: &str) -> DateKey {
        raw.parse().expect("valid date")
    }

    fn headers_in_order(rendered: &str) -> Vec<String> {
        rendered
            .lines()
            .filter(|line| line.starts_with("## ") || line.starts_with("### "))
            .map(ToOwned::to_owned)
            .collect()
    }

    fn sample_document() -> Document {
        let inputs = [
            ("2026-02-14", "10: _abc_\nbody"),
            ("2026-02-16", "31: _d_\n\n+ contact"),
            ("2026-02-14", "12: _xyz_\nbody2"),
            ("2026-02-15", "5: _e_"),
            ("2026-02-14", "10: _abc_\nbody updated"),
            ("2026-02-16", "2: _f_\n\nline one\n  > quoted"),
        ];
        inputs
            .into_iter()
            .fold(Document::new(), |doc, (date, text)| upsert(doc, day(date), block(text)))
    }

    #[test]
    fn newer_sequence_is_rendered_first_within_one_date() {
        let doc = upsert(Document::new(), day("2026-02-14"), block("10: _abc_\nbody"));
        let doc = upsert(doc, day("2026-02-14"), block("12: _xyz_\nbody2"));
        let rendered = doc.serialize();

        assert_eq!(
            headers_in_order(&rendered),
            vec!["## 2026-02-14", "### 12: _xyz_", "### 10: _abc_"]
        );
        assert_eq!(rendered.matches("## 2026-02-14").count(), 1);
    }

    #[test]
    fn repeated_upsert_is_byte_identical() {
        let mut doc = Document::new();
        let first = doc.upsert(day("2026-02-14"), block("10: _abc_\nB"));
        let once = doc.serialize();
        let second = doc.upsert(day("2026-02-14"), block("10: _abc_\nB"));
        let twice = doc.serialize();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Unchanged);
        assert_eq!(once, twice);
    }

    #[test]
    fn changed_body_replaces_entry_in_place() {
        let mut doc = Document::new();
        doc.upsert(day("2026-02-14"), block("12: _x_\nother"));
        doc.upsert(day("2026-02-14"), block("10: _abc_\nB1"));
        doc.upsert(day("2026-02-14"), block("8: _y_\nlast"));

        let outcome = doc.upsert(day("2026-02-14"), block("10: _abc_\nB2"));
        let rendered = doc.serialize();

        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert!(rendered.contains("B2"));
        assert!(!rendered.contains("B1"));
        assert_eq!(
            headers_in_order(&rendered),
            vec!["## 2026-02-14", "### 12: _x_", "### 10: _abc_", "### 8: _y_"]
        );
    }

    #[test]
    fn later_write_wins_like_a_single_write() {
        let base = sample_document();
        let twice = upsert(
            upsert(base.clone(), day("2026-02-14"), block("10: _abc_\nb1")),
            day("2026-02-14"),
            block("10: _abc_\nb2"),
        );
        let once = upsert(base, day("2026-02-14"), block("10: _abc_\nb2"));
        assert_eq!(twice, once);
        assert_eq!(twice.serialize(), once.serialize());
    }

    #[test]
    fn new_date_is_rendered_before_older_date() {
        let doc = upsert(Document::new(), day("2026-02-14"), block("10: _abc_\nbody"));
        let doc = upsert(doc, day("2026-02-15"), block("5: _new_\nbody"));

        assert_eq!(
            headers_in_order(&doc.serialize()),
            vec!["## 2026-02-15", "### 5: _new_", "## 2026-02-14", "### 10: _abc_"]
        );
    }

    #[test]
    fn merged_document_survives_a_round_trip() {
        let doc = sample_document();
        let outcome = Document::parse(&doc.serialize());
        assert!(outcome.anomalies.is_empty());
        assert_eq!(outcome.document, doc);
        assert_eq!(outcome.document.serialize(), doc.serialize());
    }

    #[test]
    fn merged_document_headers_are_strictly_descending() {
        let doc = sample_document();
        let rendered = doc.serialize();

        let dates = rendered
            .lines()
            .filter_map(|line| line.strip_prefix("## "))
            .collect::<Vec<_>>();
        assert_eq!(dates, vec!["2026-02-16", "2026-02-15", "2026-02-14"]);

        for date in &dates {
            let sequences = doc
                .group(date)
                .expect("group")
                .iter_descending()
                .map(TextBlock::sequence)
                .collect::<Vec<_>>();
            assert!(sequences.windows(2).all(|pair| pair[0] > pair[1]));
        }
        assert_eq!(doc.entry_count(), 5);
    }

    #[test]
    fn distinct_keys_commute() {
        let a = ("2026-02-14", "10: _a_\nx");
        let b = ("2026-02-15", "3: _b_\ny");
        let c = ("2026-02-14", "11: _c_\nz");

        let forward = [a, b, c]
            .into_iter()
            .fold(Document::new(), |doc, (d, t)| upsert(doc, day(d), block(t)));
        let backward = [c, b, a]
            .into_iter()
            .fold(Document::new(), |doc, (d, t)| upsert(doc, day(d), block(t)));
        assert_eq!(forward.serialize(), backward.serialize());
    }

    #[test]
    fn upsert_into_parsed_ledger_keeps_other_entries() {
        let text = "## 2026-02-14\n\n### not-a-number: _bad_\n\n### 7: _ok_\n\nfine\n";
        let parsed = Document::parse(text).document;
        let doc = upsert(parsed, day("2026-02-14"), block("9: _new_\nnew"));
        assert_eq!(
            doc.serialize(),
            "## 2026-02-14\n\n### 9: _new_\nnew\n\n### 7: _ok_\n\nfine\n"
        );
    }

    #[test]
    fn parsed_block_with_marker_lines_keeps_one_entry_after_round_trip() {
        let doc = upsert(
            Document::new(),
            day("2026-02-14"),
            block("10: _abc_\nnote\n### 11: ghost\n## 2026-03-01"),
        );
        let reparsed = Document::parse(&doc.serialize());
        assert!(reparsed.anomalies.is_empty());
        assert_eq!(reparsed.document, doc);
        assert_eq!(reparsed.document.entry_count(), 1);
        assert_eq!(reparsed.document.date_count(), 1);
    }

    #[test]
    fn blank_or_malformed_date_keys_are_rejected() {
        for raw in ["", "  ", "2026-02-14\n## x", "14/02/2026", "2026-02-30"] {
            assert!(raw.parse::<DateKey>().is_err(), "{raw:?} accepted");
        }
        assert_eq!(day(" 2026-02-14 ").to_string(), "2026-02-14");
    }
}
