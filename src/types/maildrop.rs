use std::fmt;

/// The maildrop summary returned by `STAT`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Stat {
    /// Number of messages in the maildrop, not counting messages marked as deleted.
    pub count: u32,
    /// Total size of those messages, in octets.
    pub size: u64,
}

/// A single scan listing returned by `LIST <index>`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListEntry {
    /// The 1-based message number.
    pub index: u32,
    /// The size of the message, in octets.
    pub size: u64,
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "messages: {}, octets: {}", self.count, self.size)
    }
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.index, self.size)
    }
}
