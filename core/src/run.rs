//! Ranked run files: one tab-separated line per (topic, hit).

use std::io::{self, Write};

pub const RUN_HEADER: &str = "QueryId\tQ\tDocID\tRank\tScore\tRunID";

pub struct RunWriter<W: Write> {
    out: W,
}

impl<W: Write> RunWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{RUN_HEADER}")?;
        Ok(Self { out })
    }

    /// Write `hits` (already highest first) with 1-based ranks.
    pub fn write_hits<'a, I>(&mut self, topic: u32, query_tag: &str, hits: I, run_id: &str) -> io::Result<()>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (rank, (docno, score)) in hits.into_iter().enumerate() {
            writeln!(self.out, "{topic}\t{query_tag}\t{docno}\t{}\t{score}\t{run_id}", rank + 1)?;
        }
        Ok(())
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
