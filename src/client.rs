#[cfg(feature = "native-tls")]
use native_tls::{TlsConnector, TlsStream};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use tracing::{debug, trace};

use super::error::{Error, ErrorKind, Result};
use super::parse::{parse_list_entry, parse_listing, parse_stat};
use super::transport::{join_block, validate_line, Transport};
use super::types::*;

/// The fixed POP3 command vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    User,
    Pass,
    Noop,
    Rset,
    Quit,
    Dele,
    Stat,
    List,
    ListAll,
    Retr,
}

impl Command {
    fn verb(self) -> &'static str {
        match self {
            Command::User => "USER",
            Command::Pass => "PASS",
            Command::Noop => "NOOP",
            Command::Rset => "RSET",
            Command::Quit => "QUIT",
            Command::Dele => "DELE",
            Command::Stat => "STAT",
            Command::List | Command::ListAll => "LIST",
            Command::Retr => "RETR",
        }
    }

    fn takes_argument(self) -> bool {
        matches!(
            self,
            Command::User | Command::Pass | Command::Dele | Command::List | Command::Retr
        )
    }

    /// Whether a successful status line is followed by a dot-terminated block.
    fn is_multiline(self) -> bool {
        matches!(self, Command::ListAll | Command::Retr)
    }

    /// Commands of the TRANSACTION state in RFC 1939.
    fn requires_auth(self) -> bool {
        matches!(
            self,
            Command::Rset
                | Command::Dele
                | Command::Stat
                | Command::List
                | Command::ListAll
                | Command::Retr
        )
    }
}

/// What the server sent back for one command.
#[derive(Debug)]
struct Response {
    /// Status line text after `+OK`.
    text: String,
    /// Lines of the multi-line block, if the command has one.
    lines: Vec<Vec<u8>>,
}

/// A session with a POP3 server.
///
/// Every method sends one command and blocks until its complete response, including any
/// multi-line block, has been read. POP3 is strictly half-duplex, and the `&mut self` receivers
/// are what keep it that way; to share a client between threads, put it behind a `Mutex`.
///
/// A client starts out [`State::Unauthenticated`] and becomes [`State::Authenticated`] once the
/// server accepts `PASS`. After [`quit`](Client::quit), or after any transport failure, the
/// stream is dropped and the client is [`State::Closed`].
#[derive(Debug)]
pub struct Client<T: Read + Write> {
    transport: Transport<T>,
    authenticated: bool,
    state_checks: bool,
}

impl Client<TcpStream> {
    /// Connects to a POP3 server over plain TCP and reads its greeting.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Client<TcpStream>> {
        let stream = TcpStream::connect(addr).map_err(Error::connect)?;
        Client::with_greeting(stream)
    }
}

#[cfg(feature = "native-tls")]
impl Client<TlsStream<TcpStream>> {
    /// Connects to a POP3 server over TLS and reads its greeting.
    ///
    /// `domain` is used for SNI and certificate verification.
    pub fn secure_connect<A: ToSocketAddrs>(
        addr: A,
        domain: &str,
        ssl_connector: &TlsConnector,
    ) -> Result<Client<TlsStream<TcpStream>>> {
        let stream = TcpStream::connect(addr).map_err(Error::connect)?;
        let ssl_stream =
            TlsConnector::connect(ssl_connector, domain, stream).map_err(Error::connect)?;
        Client::with_greeting(ssl_stream)
    }
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client over an already connected stream.
    ///
    /// The server greeting has not been consumed yet; call
    /// [`read_greeting`](Client::read_greeting) before issuing any command.
    pub fn new(stream: T) -> Client<T> {
        Client {
            transport: Transport::new(stream),
            authenticated: false,
            state_checks: true,
        }
    }

    /// Wraps `stream` and reads the greeting, failing if the server does not answer `+OK`.
    pub(crate) fn with_greeting(stream: T) -> Result<Client<T>> {
        let mut client = Client::new(stream);
        client.read_greeting()?;
        Ok(client)
    }

    /// Reads the server greeting and returns its text.
    ///
    /// A greeting that cannot be read, or that is not `+OK`, is an [`ErrorKind::Greeting`] error
    /// and closes the session.
    pub fn read_greeting(&mut self) -> Result<String> {
        match self.transport.read_status("greeting") {
            Ok(greeting) => {
                debug!(%greeting, "POP3 server ready");
                Ok(greeting)
            }
            Err(e) => {
                self.transport.close();
                Err(e.into_greeting())
            }
        }
    }

    /// The current state of the session.
    pub fn state(&self) -> State {
        if self.transport.is_closed() {
            State::Closed
        } else if self.authenticated {
            State::Authenticated
        } else {
            State::Unauthenticated
        }
    }

    /// Enables or disables the local session state checks.
    ///
    /// When enabled (the default), maildrop commands issued before a successful `PASS` fail
    /// with [`ErrorKind::InvalidState`] without contacting the server. When disabled, they are
    /// sent anyway and the server decides. Commands on a closed session always fail.
    pub fn set_state_checks(&mut self, enabled: bool) {
        self.state_checks = enabled;
    }

    /// Identifies the user to the server (`USER`).
    pub fn user(&mut self, name: &str) -> Result<()> {
        self.execute(Command::User, Some(name)).map(|_| ())
    }

    /// Supplies the user's secret (`PASS`). On success the session is authenticated.
    pub fn pass(&mut self, secret: &str) -> Result<()> {
        self.execute(Command::Pass, Some(secret))?;
        self.authenticated = true;
        debug!("POP3 session authenticated");
        Ok(())
    }

    /// Authenticates with `USER` followed by `PASS`.
    ///
    /// If the server rejects `USER`, that error is returned and `PASS` is never sent.
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.user(username)?;
        self.pass(password)
    }

    /// Does nothing, but keeps the connection alive (`NOOP`).
    pub fn noop(&mut self) -> Result<()> {
        self.execute(Command::Noop, None).map(|_| ())
    }

    /// Unmarks any messages marked as deleted in this session (`RSET`).
    pub fn rset(&mut self) -> Result<()> {
        self.execute(Command::Rset, None).map(|_| ())
    }

    /// Ends the session (`QUIT`).
    ///
    /// The server removes messages marked as deleted when it accepts `QUIT`. Whatever it
    /// answers, the stream is dropped afterwards and the client is closed.
    pub fn quit(&mut self) -> Result<()> {
        let res = self.execute(Command::Quit, None);
        self.transport.close();
        res.map(|_| ())
    }

    /// Marks message `index` as deleted (`DELE`).
    pub fn dele(&mut self, index: Index) -> Result<()> {
        let arg = index_argument(Command::Dele, index)?;
        self.execute(Command::Dele, Some(&arg)).map(|_| ())
    }

    /// Returns the number of messages in the maildrop and their total size (`STAT`).
    pub fn stat(&mut self) -> Result<Stat> {
        let resp = self.execute(Command::Stat, None)?;
        parse_stat(&resp.text).map_err(|kind| Error::new(Command::Stat.verb(), kind))
    }

    /// Returns the scan listing of message `index` (`LIST <index>`).
    pub fn list(&mut self, index: Index) -> Result<ListEntry> {
        let arg = index_argument(Command::List, index)?;
        let resp = self.execute(Command::List, Some(&arg))?;
        parse_list_entry(&resp.text).map_err(|kind| Error::new(Command::List.verb(), kind))
    }

    /// Returns the size of every message in the maildrop, in order (`LIST`).
    ///
    /// Element `i` is the size of message `i + 1`. A listing that skips or reorders message
    /// numbers is a format error, and no partial result is returned.
    pub fn list_all(&mut self) -> Result<Vec<u64>> {
        let resp = self.execute(Command::ListAll, None)?;
        parse_listing(&resp.lines).map_err(|kind| Error::new(Command::ListAll.verb(), kind))
    }

    /// Retrieves message `index` (`RETR`).
    ///
    /// The message is returned with byte-stuffing undone and every line terminated by a single
    /// LF.
    pub fn retr(&mut self, index: Index) -> Result<Vec<u8>> {
        let arg = index_argument(Command::Retr, index)?;
        let resp = self.execute(Command::Retr, Some(&arg))?;
        Ok(join_block(resp.lines))
    }

    /// Sends one command and reads its whole response.
    fn execute(&mut self, command: Command, argument: Option<&str>) -> Result<Response> {
        let op = command.verb();
        debug_assert_eq!(argument.is_some(), command.takes_argument(), "{}", op);

        let state = self.state();
        if state == State::Closed
            || (self.state_checks && command.requires_auth() && state != State::Authenticated)
        {
            return Err(Error::new(op, ErrorKind::InvalidState(state)));
        }

        let line = match argument {
            Some(arg) => {
                validate_line(arg).map_err(|kind| Error::new(op, kind))?;
                format!("{} {}", op, arg)
            }
            None => op.to_string(),
        };
        if command == Command::Pass {
            trace!("C: PASS ****");
        } else {
            trace!("C: {}", line);
        }

        self.transport.write_line(op, &line)?;
        let text = match self.transport.read_status(op) {
            Ok(text) => text,
            // A block may follow that cannot be skipped without a recognised status.
            Err(e) if command.is_multiline() && matches!(e.kind(), ErrorKind::Format(_)) => {
                self.transport.close();
                return Err(e.into_fatal());
            }
            Err(e) => return Err(e),
        };
        let lines = if command.is_multiline() {
            self.transport.read_block_lines(op)?
        } else {
            Vec::new()
        };
        Ok(Response { text, lines })
    }
}

fn index_argument(command: Command, index: Index) -> Result<String> {
    if index == 0 {
        return Err(Error::new(
            command.verb(),
            ErrorKind::InvalidArgument("message numbers start at 1".to_string()),
        ));
    }
    Ok(index.to_string())
}

#[cfg(test)]
mod tests {
    use super::super::mock_stream::MockStream;
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn client(response: &[u8]) -> (Client<MockStream>, Rc<RefCell<Vec<u8>>>) {
        let mock = MockStream::new(response.to_vec());
        let written = mock.written();
        (Client::new(mock), written)
    }

    fn authed(response: &[u8]) -> (Client<MockStream>, Rc<RefCell<Vec<u8>>>) {
        let (mut client, written) = client(response);
        client.authenticated = true;
        (client, written)
    }

    fn assert_written(written: &Rc<RefCell<Vec<u8>>>, expected: &str) {
        assert_eq!(
            String::from_utf8_lossy(&written.borrow()),
            expected,
            "Invalid command"
        );
    }

    #[test]
    fn read_greeting() {
        let (mut client, written) =
            client(b"+OK POP3 server ready <1896.697170952@dbc.mtview.ca.us>\r\n");
        let greeting = client.read_greeting().unwrap();
        assert_eq!(greeting, "POP3 server ready <1896.697170952@dbc.mtview.ca.us>");
        assert_eq!(client.state(), State::Unauthenticated);
        assert!(written.borrow().is_empty());
    }

    #[test]
    fn read_greeting_rejected() {
        let (mut client, _) = client(b"-ERR server busy\r\n");
        let err = client.read_greeting().unwrap_err();
        assert_eq!(err.operation(), "greeting");
        match err.kind() {
            ErrorKind::Greeting(inner) => match **inner {
                ErrorKind::Rejected(ref text) => assert_eq!(text, "server busy"),
                ref e => panic!("Wrong cause: {:?}", e),
            },
            e => panic!("Wrong error: {:?}", e),
        }
        assert_eq!(client.state(), State::Closed);
    }

    #[test]
    fn read_greeting_malformed() {
        let (mut client, _) = client(b"* OK IMAP4rev1 ready\r\n");
        let err = client.read_greeting().unwrap_err();
        match err.kind() {
            ErrorKind::Greeting(inner) => assert!(matches!(**inner, ErrorKind::Format(_))),
            e => panic!("Wrong error: {:?}", e),
        }
    }

    #[test]
    fn read_greeting_eof() {
        let mut client = Client::new(MockStream::default().with_eof());
        let err = client.read_greeting().unwrap_err();
        match err.kind() {
            ErrorKind::Greeting(inner) => assert!(matches!(**inner, ErrorKind::ConnectionLost)),
            e => panic!("Wrong error: {:?}", e),
        }
        assert_eq!(client.state(), State::Closed);
    }

    #[test]
    fn with_greeting_returns_client() {
        let mock = MockStream::new(b"+OK ready\r\n".to_vec());
        let client = Client::with_greeting(mock).unwrap();
        assert_eq!(client.state(), State::Unauthenticated);

        let mock = MockStream::new(b"-ERR go away\r\n".to_vec());
        assert!(Client::with_greeting(mock).is_err());
    }

    #[test]
    fn user() {
        let (mut client, written) = client(b"+OK send PASS\r\n");
        client.user("alice").unwrap();
        assert_written(&written, "USER alice\r\n");
        assert_eq!(client.state(), State::Unauthenticated);
    }

    #[test]
    fn pass_authenticates() {
        let (mut client, written) = client(b"+OK maildrop locked and ready\r\n");
        client.pass("s3cret").unwrap();
        assert_written(&written, "PASS s3cret\r\n");
        assert_eq!(client.state(), State::Authenticated);
    }

    #[test]
    fn pass_rejected() {
        let (mut client, _) = client(b"-ERR invalid password\r\n");
        let err = client.pass("wrong").unwrap_err();
        assert_eq!(err.operation(), "PASS");
        match err.kind() {
            ErrorKind::Rejected(text) => assert_eq!(text, "invalid password"),
            e => panic!("Wrong error: {:?}", e),
        }
        assert!(!err.is_fatal());
        assert_eq!(client.state(), State::Unauthenticated);
    }

    #[test]
    fn login() {
        let (mut client, written) = client(b"+OK\r\n+OK logged in\r\n");
        client.login("alice", "s3cret").unwrap();
        assert_written(&written, "USER alice\r\nPASS s3cret\r\n");
        assert_eq!(client.state(), State::Authenticated);
    }

    #[test]
    fn login_stops_after_rejected_user() {
        let (mut client, written) = client(b"-ERR never heard of mailbox name\r\n+OK\r\n");
        let err = client.login("mrose", "secret").unwrap_err();
        assert_eq!(err.operation(), "USER");
        assert!(matches!(err.kind(), ErrorKind::Rejected(_)));
        assert_written(&written, "USER mrose\r\n");
        assert_eq!(client.state(), State::Unauthenticated);
    }

    #[test]
    fn login_rejects_line_breaks() {
        let (mut client, written) = client(b"+OK\r\n");
        let err = client.login("alice\r\nDELE 1", "x").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
        assert!(written.borrow().is_empty());
    }

    #[test]
    fn login_again_is_left_to_server() {
        let (mut client, written) = authed(b"-ERR already authenticated\r\n");
        let err = client.login("alice", "s3cret").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Rejected(_)));
        assert_written(&written, "USER alice\r\n");
        assert_eq!(client.state(), State::Authenticated);
    }

    #[test]
    fn noop() {
        let (mut client, written) = client(b"+OK\r\n");
        client.noop().unwrap();
        assert_written(&written, "NOOP\r\n");
    }

    #[test]
    fn rset() {
        let (mut client, written) = authed(b"+OK maildrop has 2 messages (320 octets)\r\n");
        client.rset().unwrap();
        assert_written(&written, "RSET\r\n");
    }

    #[test]
    fn quit() {
        let (mut client, written) = authed(b"+OK dewey POP3 server signing off\r\n");
        client.quit().unwrap();
        assert_written(&written, "QUIT\r\n");
        assert_eq!(client.state(), State::Closed);
    }

    #[test]
    fn quit_rejected_still_closes() {
        let (mut client, _) = authed(b"-ERR some deleted messages not removed\r\n");
        let err = client.quit().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Rejected(_)));
        assert_eq!(client.state(), State::Closed);
    }

    #[test]
    fn closed_session_refuses_commands() {
        let (mut client, written) = authed(b"+OK bye\r\n+OK\r\n");
        client.quit().unwrap();
        let err = client.noop().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidState(State::Closed)));
        assert_written(&written, "QUIT\r\n");

        client.set_state_checks(false);
        assert!(client.stat().is_err());
    }

    #[test]
    fn dele() {
        let (mut client, written) = authed(b"+OK message 1 deleted\r\n");
        client.dele(1).unwrap();
        assert_written(&written, "DELE 1\r\n");
    }

    #[test]
    fn dele_zero_is_local() {
        let (mut client, written) = authed(b"+OK\r\n");
        let err = client.dele(0).unwrap_err();
        assert_eq!(err.operation(), "DELE");
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
        assert!(written.borrow().is_empty());
    }

    #[test]
    fn dele_rejected() {
        let (mut client, _) = authed(b"-ERR message 2 already deleted\r\n");
        match client.dele(2).unwrap_err().kind() {
            ErrorKind::Rejected(text) => assert_eq!(text, "message 2 already deleted"),
            e => panic!("Wrong error: {:?}", e),
        }
    }

    #[test]
    fn stat() {
        let (mut client, written) = authed(b"+OK 2 320\r\n");
        assert_eq!(client.stat().unwrap(), Stat { count: 2, size: 320 });
        assert_written(&written, "STAT\r\n");
    }

    #[test]
    fn stat_malformed() {
        for response in &["+OK 2\r\n", "+OK two 320\r\n", "+OK\r\n"] {
            let (mut client, _) = authed(response.as_bytes());
            let err = client.stat().unwrap_err();
            assert_eq!(err.operation(), "STAT");
            assert!(
                matches!(err.kind(), ErrorKind::Format(_)),
                "{:?} gave {:?}",
                response,
                err
            );
            assert_eq!(client.state(), State::Authenticated);
        }
    }

    #[test]
    fn unknown_marker_is_format_error() {
        let (mut client, _) = authed(b"OK 2 320\r\n");
        match client.stat().unwrap_err().kind() {
            ErrorKind::Format(line) => assert_eq!(line, "OK 2 320"),
            e => panic!("Wrong error: {:?}", e),
        }
    }

    #[test]
    fn state_checks() {
        let (mut client, written) = client(b"+OK 2 320\r\n");
        let err = client.stat().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidState(State::Unauthenticated)
        ));
        assert!(client.retr(1).is_err());
        assert!(client.list_all().is_err());
        assert!(written.borrow().is_empty());

        client.set_state_checks(false);
        assert_eq!(client.stat().unwrap(), Stat { count: 2, size: 320 });
        assert_written(&written, "STAT\r\n");
    }

    #[test]
    fn list() {
        let (mut client, written) = authed(b"+OK 2 200\r\n");
        assert_eq!(client.list(2).unwrap(), ListEntry { index: 2, size: 200 });
        assert_written(&written, "LIST 2\r\n");
    }

    #[test]
    fn list_zero_is_local() {
        let (mut client, written) = authed(b"+OK 0 0\r\n");
        let err = client.list(0).unwrap_err();
        assert_eq!(err.operation(), "LIST");
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
        assert!(written.borrow().is_empty());
    }

    #[test]
    fn list_no_such_message() {
        let (mut client, _) = authed(b"-ERR no such message, only 2 messages in maildrop\r\n");
        let err = client.list(3).unwrap_err();
        match err.kind() {
            ErrorKind::Rejected(text) => {
                assert_eq!(text, "no such message, only 2 messages in maildrop")
            }
            e => panic!("Wrong error: {:?}", e),
        }
    }

    #[test]
    fn list_all() {
        let (mut client, written) =
            authed(b"+OK 3 messages (510 octets)\r\n1 120\r\n2 340\r\n3 50\r\n.\r\n");
        assert_eq!(client.list_all().unwrap(), vec![120, 340, 50]);
        assert_written(&written, "LIST\r\n");
    }

    #[test]
    fn list_all_empty() {
        let (mut client, _) = authed(b"+OK 0 messages\r\n.\r\n");
        assert!(client.list_all().unwrap().is_empty());
    }

    #[test]
    fn list_all_gap() {
        let (mut client, _) = authed(b"+OK\r\n1 120\r\n4 340\r\n3 50\r\n.\r\n+OK\r\n");
        let err = client.list_all().unwrap_err();
        assert_eq!(err.operation(), "LIST");
        match err.kind() {
            ErrorKind::Format(line) => assert_eq!(line, "4 340"),
            e => panic!("Wrong error: {:?}", e),
        }
        // the whole block was consumed, so the session is still in sync
        client.noop().unwrap();
    }

    #[test]
    fn list_all_rejected_reads_no_block() {
        let (mut client, _) = authed(b"-ERR try later\r\n+OK\r\n");
        assert!(matches!(
            client.list_all().unwrap_err().kind(),
            ErrorKind::Rejected(_)
        ));
        client.noop().unwrap();
    }

    #[test]
    fn retr() {
        let (mut client, written) = authed(
            b"+OK 1234 octets\r\n\
              From: alice@example.org\r\n\
              Subject: dots\r\n\
              \r\n\
              ..leading dot\r\n\
              last line\r\n\
              .\r\n",
        );
        let message = client.retr(5).unwrap();
        assert_written(&written, "RETR 5\r\n");
        assert_eq!(
            String::from_utf8(message).unwrap(),
            "From: alice@example.org\nSubject: dots\n\n.leading dot\nlast line\n"
        );
    }

    #[test]
    fn retr_truncated() {
        let (mut client, _) = authed(b"+OK 120 octets\r\nFrom: bob\r\n");
        let err = client.retr(1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BlockRead(_)));
        assert!(err.is_fatal());
        assert_eq!(client.state(), State::Closed);
    }

    #[test]
    fn retr_malformed_status_closes() {
        let (mut client, _) = authed(b"+OK. 12 octets\r\nhello\r\n.\r\n+OK\r\n");
        let err = client.retr(1).unwrap_err();
        assert_eq!(err.operation(), "RETR");
        assert!(matches!(err.kind(), ErrorKind::Format(_)));
        assert!(err.is_fatal());
        assert_eq!(client.state(), State::Closed);
        assert!(matches!(
            client.noop().unwrap_err().kind(),
            ErrorKind::InvalidState(State::Closed)
        ));
    }

    #[test]
    fn list_all_malformed_status_closes() {
        let (mut client, _) = authed(b"OK 2 messages\r\n1 10\r\n2 20\r\n.\r\n");
        let err = client.list_all().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(client.state(), State::Closed);
    }

    #[test]
    fn single_line_malformed_status_keeps_session() {
        let (mut client, _) = authed(b"OK fine\r\n+OK\r\n");
        let err = client.noop().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Format(_)));
        assert!(!err.is_fatal());
        client.noop().unwrap();
        assert_eq!(client.state(), State::Authenticated);
    }

    #[test]
    fn retr_zero_is_local() {
        let (mut client, written) = authed(b"+OK\r\n.\r\n");
        assert!(matches!(
            client.retr(0).unwrap_err().kind(),
            ErrorKind::InvalidArgument(_)
        ));
        assert!(written.borrow().is_empty());
    }

    #[test]
    fn write_error_closes() {
        let mut client = Client::new(MockStream::default().with_write_err());
        let err = client.noop().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Write(_)));
        assert_eq!(client.state(), State::Closed);
    }

    #[test]
    fn command_table() {
        assert_eq!(Command::ListAll.verb(), Command::List.verb());
        assert!(Command::ListAll.is_multiline());
        assert!(!Command::List.is_multiline());
        assert!(Command::Retr.is_multiline());
        assert!(!Command::ListAll.takes_argument());
        assert!(!Command::Noop.requires_auth());
        assert!(!Command::User.requires_auth());
        assert!(Command::Rset.requires_auth());
    }
}
