//! Process-long engine counters.
//!
//! These are never persisted: they describe one process's view of I/O
//! activity since open or since the last
//! [`crate::StorageEngine::reset_stats`], so there is only accumulation
//! and a human-readable `Display`, no encode/decode pair.

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub data_page_reads: u64,
    pub data_page_writes: u64,
    pub index_page_reads: u64,
    pub index_page_writes: u64,
    pub buffer_hits: u64,
}

impl Stats {
    pub fn reset(&mut self) {
        *self = Stats::default();
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sbits stats:")?;
        writeln!(f, "  data page reads:   {}", self.data_page_reads)?;
        writeln!(f, "  data page writes:  {}", self.data_page_writes)?;
        writeln!(f, "  index page reads:  {}", self.index_page_reads)?;
        writeln!(f, "  index page writes: {}", self.index_page_writes)?;
        write!(f, "  buffer hits:       {}", self.buffer_hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_all_counters() {
        let mut stats = Stats {
            data_page_reads: 3,
            data_page_writes: 2,
            index_page_reads: 1,
            index_page_writes: 1,
            buffer_hits: 5,
        };
        stats.reset();
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn display_includes_every_counter() {
        let stats = Stats {
            data_page_reads: 1,
            ..Default::default()
        };
        let rendered = stats.to_string();
        assert!(rendered.contains("data page reads:   1"));
        assert!(rendered.contains("buffer hits:       0"));
    }
}
