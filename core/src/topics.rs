//! TREC topic files: `<top>` blocks holding a number, a short title query
//! and a longer description query.

use crate::corpus::DocumentReader;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::BufRead;

lazy_static! {
    static ref NUM_RE: Regex = Regex::new(r"(?is)<num>\s*(?:Number:)?\s*(.+?)\s*(?:<|$)").expect("valid regex");
    static ref TITLE_RE: Regex = Regex::new(r"(?is)<title>\s*(?:Topic:)?\s*(.+?)\s*(?:<|$)").expect("valid regex");
    static ref DESC_RE: Regex = Regex::new(r"(?is)<desc>\s*(?:Description:)?\s*(.+?)\s*(?:<|$)").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub number: u32,
    pub title: String,
    pub description: String,
}

/// Which part of a topic becomes the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Short,
    Long,
}

impl QueryKind {
    pub fn query<'t>(&self, topic: &'t Topic) -> &'t str {
        match self {
            QueryKind::Short => &topic.title,
            QueryKind::Long => &topic.description,
        }
    }

    /// Query tag written in the second column of a run file.
    pub fn tag(&self) -> &'static str {
        match self {
            QueryKind::Short => "Q0",
            QueryKind::Long => "Q1",
        }
    }

    pub fn run_id(&self, prefix: &str) -> String {
        match self {
            QueryKind::Short => format!("{prefix}_short"),
            QueryKind::Long => format!("{prefix}_long"),
        }
    }
}

fn capture(re: &Regex, block: &str) -> String {
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Parse every well-formed topic. Blocks without an integer number, and
/// unterminated blocks, are skipped with a warning.
pub fn parse_topics<R: BufRead>(reader: R) -> Vec<Topic> {
    let mut topics = Vec::new();
    for block in DocumentReader::with_markers(reader, "<top>", "</top>") {
        let block = match block {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed topic");
                continue;
            }
        };
        let raw_num = capture(&NUM_RE, &block.body);
        let number = match raw_num.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(line = block.line, number = %raw_num, "skipping topic without a numeric id");
                continue;
            }
        };
        topics.push(Topic { number, title: capture(&TITLE_RE, &block.body), description: capture(&DESC_RE, &block.body) });
    }
    topics
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TOPICS: &str = "<top>
<head> Tipster Topic Description
<num> Number: 051
<dom> Domain: International Economics

<title> Topic: Airbus Subsidies

<desc> Description:
Document will discuss government assistance to Airbus Industrie,
or mention a trade dispute.

<smry> Summary:
ignored
</top>

<top>
<num> Number: abc
<title> Topic: broken
</top>
<top>
<num> Number: 52
<title> Topic: South African Sanctions
</top>
";

    #[test]
    fn parses_number_title_and_description() {
        let topics = parse_topics(Cursor::new(TOPICS));
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].number, 51);
        assert_eq!(topics[0].title, "Airbus Subsidies");
        assert_eq!(
            topics[0].description,
            "Document will discuss government assistance to Airbus Industrie, or mention a trade dispute."
        );
        assert_eq!(topics[1].number, 52);
        assert_eq!(topics[1].description, "");
    }

    #[test]
    fn query_kinds() {
        let topic = Topic { number: 1, title: "t".into(), description: "d".into() };
        assert_eq!(QueryKind::Short.query(&topic), "t");
        assert_eq!(QueryKind::Long.tag(), "Q1");
        assert_eq!(QueryKind::Long.run_id("tfidf"), "tfidf_long");
    }
}
