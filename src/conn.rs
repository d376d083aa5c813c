use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};

/// POP3 connection trait of a read/write stream
pub trait Pop3Connection: Read + Write + Send + private::Sealed {}

impl<T> Pop3Connection for T where T: Read + Write + Send {}

impl Debug for dyn Pop3Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "POP3 connection")
    }
}

/// A boxed connection type, plain or encrypted depending on how the client was built.
pub type Connection = Box<dyn Pop3Connection>;

mod private {
    use super::{Read, Write};

    pub trait Sealed {}

    impl<T> Sealed for T where T: Read + Write {}
}
