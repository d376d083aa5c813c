//! POP3 client bindings for Rust.
//!
//! This crate speaks the client side of the Post Office Protocol, version 3
//! ([RFC 1939](https://tools.ietf.org/html/rfc1939)): it connects to a maildrop over plain TCP or
//! TLS, authenticates with `USER`/`PASS`, and lists, retrieves and deletes messages.
//!
//! # Usage
//!
//! Build a [`Client`] with a [`ClientBuilder`], authenticate, and issue commands. Each command
//! blocks until the server's complete response has been read.
//!
//! ```no_run
//! # fn main() -> Result<(), pop3::Error> {
//! let mut client = pop3::ClientBuilder::new("pop.example.com", 995)
//!     .tls(true)
//!     .connect()?;
//!
//! client.login("username", "password")?;
//!
//! let stat = client.stat()?;
//! println!("{} messages, {} octets", stat.count, stat.size);
//!
//! for (i, size) in client.list_all()?.into_iter().enumerate() {
//!     println!("message {}: {} octets", i + 1, size);
//! }
//!
//! if stat.count > 0 {
//!     let message = client.retr(stat.count)?;
//!     println!("{}", String::from_utf8_lossy(&message));
//! }
//!
//! client.quit()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Every operation returns a [`Result`]. The [`Error`] names the failing command and carries an
//! [`ErrorKind`] that tells transport failures (fatal to the session), server rejections
//! (`-ERR`), malformed responses and locally refused arguments apart.
//!
//! # Logging
//!
//! Commands and status lines are emitted as `tracing` events at `TRACE` level, with the `PASS`
//! argument masked. Connection setup and teardown are logged at `DEBUG`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod client;
mod client_builder;
mod conn;
mod parse;
mod transport;
mod types;

pub mod error;

pub use crate::client::Client;
pub use crate::client_builder::{ClientBuilder, POP3S_PORT, POP3_PORT};
pub use crate::conn::{Connection, Pop3Connection};
pub use crate::error::{ConnectError, Error, ErrorKind, Result};
pub use crate::types::*;

#[cfg(test)]
mod mock_stream;
