use std::fmt;

/// The logical state of a POP3 session.
///
/// RFC 1939 calls these the AUTHORIZATION, TRANSACTION and UPDATE states. The client only
/// tracks what it can observe: whether `PASS` has succeeded, and whether the stream is gone.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum State {
    /// Connected and greeted, but no `PASS` has been accepted yet.
    #[default]
    Unauthenticated,
    /// The server accepted `PASS`; the maildrop may be accessed.
    Authenticated,
    /// `QUIT` was issued or the stream failed. The stream has been dropped.
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            State::Unauthenticated => "unauthenticated",
            State::Authenticated => "authenticated",
            State::Closed => "closed",
        })
    }
}
