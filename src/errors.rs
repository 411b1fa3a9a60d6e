use thiserror::Error;

/// Error types returned by this crate.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// A single PDU would exceed the 65536 byte size limit, either while
    /// building outgoing bytes or while accumulating unparsed incoming
    /// bytes.
    ///
    /// Fatal: the connection the error was raised on must be closed.
    #[error("omapi packet size limit reached")]
    SizeLimit,

    /// An integer or string value handed to an [`OutBuffer`](crate::OutBuffer)
    /// write method does not fit the wire width being written (16 or 32
    /// bits).
    #[error("value does not fit in a {0}-bit wire field")]
    ValueOutOfRange(u8),

    /// The peer's startup frame advertised a protocol version other than
    /// the one this client speaks.
    ///
    /// Fatal.
    #[error("protocol version mismatch (got {got}, want {want})")]
    ProtocolMismatch {
        /// The version the peer sent.
        got: u32,
        /// The version this client requires.
        want: u32,
    },

    /// The peer's startup frame advertised a header size other than the
    /// fixed 24-byte OMAPI message header.
    ///
    /// Fatal.
    #[error("header size mismatch (got {got}, want {want})")]
    HeaderSizeMismatch {
        /// The header size the peer sent.
        got: u32,
        /// The header size this client requires.
        want: u32,
    },

    /// An operation was attempted on a [`Client`](crate::Client) after it
    /// was closed, or after a transport error closed it implicitly.
    #[error("not connected")]
    NotConnected,

    /// The peer closed the connection (read returned zero bytes) while a
    /// message was expected.
    ///
    /// Fatal.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A received message's signature did not verify against the
    /// authenticator its `authid` selects, or its `authid` did not resolve
    /// to any known authenticator.
    ///
    /// Fatal.
    #[error("bad omapi message signature")]
    BadSignature,

    /// A received message is signed by an authenticator other than the
    /// connection's default, and the caller did not opt into accepting an
    /// insecure response.
    #[error("received message is signed with the wrong authenticator")]
    WrongAuthenticator,

    /// A received message's `rid` does not match the `tid` of the request
    /// it was read in response to.
    ///
    /// Fatal.
    #[error("received message is not the expected response")]
    UnexpectedResponse,

    /// A lookup or delete found no matching object, or an expected
    /// attribute was absent from an UPDATE response.
    #[error("not found")]
    NotFound,

    /// Any other protocol-level failure not covered by a more specific
    /// variant, such as a host operation receiving an unexpected opcode.
    #[error("omapi error: {0}")]
    Omapi(String),

    /// A supplied IPv4 address or MAC address string is not well-formed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The authentication key supplied to [`Client::connect`](crate::Client::connect)
    /// is not valid base64.
    #[error("invalid base64 key: {0}")]
    InvalidKey(#[from] base64::DecodeError),

    /// An I/O error occurred on the underlying transport.
    #[error("i/o error ({0:?}): {1}")]
    IOError(std::io::ErrorKind, String),
}

impl From<std::io::Error> for Error {
    fn from(v: std::io::Error) -> Self {
        Self::IOError(v.kind(), v.to_string())
    }
}
