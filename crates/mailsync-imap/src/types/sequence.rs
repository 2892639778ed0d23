//! Sequence sets for FETCH and UID FETCH.

use std::fmt;

use super::{SeqNum, Uid};

/// A set of message numbers in IMAP `sequence-set` syntax.
///
/// The same type carries sequence numbers or UIDs; the command decides
/// which by its `UID` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSet {
    /// Single number.
    Single(u32),
    /// Inclusive range.
    Range(u32, u32),
    /// From a number to the end of the mailbox (`n:*`).
    RangeFrom(u32),
    /// Comma-separated list of the other forms.
    Set(Vec<Self>),
}

impl SequenceSet {
    /// Every message: `1:*`.
    #[must_use]
    pub const fn all() -> Self {
        Self::RangeFrom(1)
    }

    /// A single sequence number.
    #[must_use]
    pub const fn seq(n: SeqNum) -> Self {
        Self::Single(n.get())
    }

    /// Builds a compact set from UIDs, merging consecutive runs into ranges.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn from_uids(uids: &[Uid]) -> Option<Self> {
        let mut values: Vec<u32> = uids.iter().map(|u| u.get()).collect();
        values.sort_unstable();
        values.dedup();

        let mut parts = Vec::new();
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let (mut start, mut end) = (first, first);

        for value in iter {
            if value == end + 1 {
                end = value;
            } else {
                parts.push(Self::run(start, end));
                start = value;
                end = value;
            }
        }
        parts.push(Self::run(start, end));

        Some(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Self::Set(parts)
        })
    }

    const fn run(start: u32, end: u32) -> Self {
        if start == end {
            Self::Single(start)
        } else {
            Self::Range(start, end)
        }
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}
