//! DUALLOG - Core Type Definitions
//! Defines fundamental types shared by the store, the dual log and the driver.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DualLogError, Result};

/// Logical timestamp used as the sort score of every log entry.
pub type Score = i64;

/// Opaque item payload. `Bytes` keeps clones cheap when the same blob
/// travels through the store and back out of range reads.
pub type Payload = bytes::Bytes;

/// One end of an inclusive score window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBound {
    NegInfinity,
    Inclusive(Score),
    PosInfinity,
}

impl ScoreBound {
    /// True if `score` lies at or above this bound when used as a minimum.
    pub fn admits_from_below(&self, score: Score) -> bool {
        match *self {
            ScoreBound::NegInfinity => true,
            ScoreBound::Inclusive(min) => score >= min,
            ScoreBound::PosInfinity => false,
        }
    }

    /// True if `score` lies at or below this bound when used as a maximum.
    pub fn admits_from_above(&self, score: Score) -> bool {
        match *self {
            ScoreBound::NegInfinity => false,
            ScoreBound::Inclusive(max) => score <= max,
            ScoreBound::PosInfinity => true,
        }
    }
}

impl fmt::Display for ScoreBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreBound::NegInfinity => f.write_str("-inf"),
            ScoreBound::Inclusive(score) => write!(f, "{}", score),
            ScoreBound::PosInfinity => f.write_str("+inf"),
        }
    }
}

/// Which of the two ordered logs an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogKind {
    Append,
    Prepend,
}

impl LogKind {
    /// Name used in store keys and placement descriptors.
    pub fn name(&self) -> &'static str {
        match self {
            LogKind::Append => "append",
            LogKind::Prepend => "prepend",
        }
    }

    /// Parse a log name as written by [`LogKind::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "append" => Some(LogKind::Append),
            "prepend" => Some(LogKind::Prepend),
            _ => None,
        }
    }

    /// Deterministic routing of the `index`-th insertion: every block of 100
    /// consecutive indices sends exactly `prepend_pct` items to the prepend log.
    pub fn for_index(index: u64, prepend_pct: u8) -> Self {
        if index % 100 < u64::from(prepend_pct) {
            LogKind::Prepend
        } else {
            LogKind::Append
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a live item currently sits: its log and the score it was added under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub log: LogKind,
    pub score: Score,
}

impl Placement {
    pub fn new(log: LogKind, score: Score) -> Self {
        Self { log, score }
    }

    /// Encode as the `"<log-name>:<score>"` descriptor stored in the index.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.log.name(), self.score)
    }

    /// Decode a descriptor produced by [`Placement::encode`].
    pub fn parse(descriptor: &str) -> Result<Self> {
        let malformed = || DualLogError::MalformedPlacement(descriptor.to_string());

        let (name, score) = descriptor.split_once(':').ok_or_else(malformed)?;
        let log = LogKind::from_name(name).ok_or_else(malformed)?;
        let score = score.parse::<Score>().map_err(|_| malformed())?;
        Ok(Self { log, score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ratio_per_block() {
        for pct in [0u8, 1, 30, 99, 100] {
            for block in 0..3u64 {
                let prepends = (block * 100..block * 100 + 100)
                    .filter(|&i| LogKind::for_index(i, pct) == LogKind::Prepend)
                    .count();
                assert_eq!(prepends, pct as usize);
            }
        }
    }

    #[test]
    fn test_split_routes_leading_indices_to_prepend() {
        let kinds: Vec<LogKind> = (0..10).map(|i| LogKind::for_index(i, 30)).collect();
        assert_eq!(&kinds[..3], &[LogKind::Prepend; 3]);
        assert!(kinds[3..].iter().all(|k| *k == LogKind::Append));
    }

    #[test]
    fn test_placement_descriptor() {
        let placement = Placement::new(LogKind::Prepend, 1_700_000_000_000_010_000);
        assert_eq!(placement.encode(), "prepend:1700000000000010000");
        assert_eq!(Placement::parse(&placement.encode()).unwrap(), placement);

        let negative = Placement::new(LogKind::Append, -5);
        assert_eq!(Placement::parse("append:-5").unwrap(), negative);
    }

    #[test]
    fn test_placement_rejects_garbage() {
        for bad in ["", "append", "middle:10", "append:ten", "prepend:1.5"] {
            assert!(matches!(
                Placement::parse(bad),
                Err(DualLogError::MalformedPlacement(_))
            ));
        }
    }

    #[test]
    fn test_score_bounds() {
        assert!(ScoreBound::NegInfinity.admits_from_below(i64::MIN));
        assert!(ScoreBound::PosInfinity.admits_from_above(i64::MAX));
        assert!(ScoreBound::Inclusive(10).admits_from_below(10));
        assert!(!ScoreBound::Inclusive(10).admits_from_below(9));
        assert!(ScoreBound::Inclusive(10).admits_from_above(10));
        assert!(!ScoreBound::Inclusive(10).admits_from_above(11));
        assert_eq!(ScoreBound::NegInfinity.to_string(), "-inf");
        assert_eq!(ScoreBound::Inclusive(42).to_string(), "42");
    }
}
