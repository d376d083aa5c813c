//! This module contains types used throughout the POP3 protocol.

/// A 1-based message number, as used by `LIST`, `RETR` and `DELE`.
///
/// Message numbers are only valid for the duration of a session; messages marked as deleted
/// keep their number until the session ends.
pub type Index = u32;

mod maildrop;
pub use self::maildrop::{ListEntry, Stat};

mod state;
pub use self::state::State;
