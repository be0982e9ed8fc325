/// Uniform error definition for every protocol in the crate.
///
/// Decode errors abort the current exchange immediately; nothing is retried
/// and no partial result is returned.
#[derive(Debug, thiserror::Error)]
pub enum ProbeErr {
    /// The stream ended before the expected number of bytes arrived.
    #[error("input ended before the expected bytes arrived")]
    TruncatedInput,
    /// Wrong packet ID, type tag or echoed value.
    #[error("unexpected response from server: {0}")]
    UnexpectedResponse(String),
    /// A VarInt or VarLong ran past its maximum encoded size.
    #[error("size of VarInt exceeds maximum data size")]
    VarIntTooBig,
    /// A field could not be parsed, or a delimited response had the wrong shape.
    #[error("malformed field: {0}")]
    MalformedField(String),
    /// RCON login was rejected by the server.
    #[error("incorrect RCON password")]
    InvalidPassword,
    /// A second RCON login was attempted on an authenticated session.
    #[error("RCON client is already logged in")]
    AlreadyLoggedIn,
    /// An RCON command was attempted before a successful login.
    #[error("RCON client attempted to send a command before logging in")]
    NotLoggedIn,
    /// The RCON session has no open connection.
    #[error("RCON client is not connected")]
    NotConnected,
    /// The Votifier greeting advertised a protocol version other than 2.
    #[error("unsupported Votifier version: {0}")]
    UnknownVotifierVersion(String),
    /// The Votifier server answered with `status: "error"`.
    #[error("Votifier server rejected the vote: {0}")]
    VoteRejected(String),
    /// A socket deadline elapsed.
    #[error("operation timed out")]
    Timeout,
    /// The favicon is not a base64 PNG data URI.
    #[error("invalid favicon: {0}")]
    InvalidFavicon(String),
    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Handling errors that occur during sockets.
    #[error("I/O error: {0}")]
    IoErr(std::io::Error),
    /// Internal errors such as clock failures.
    #[error("{0}")]
    InternalErr(String),
}

impl From<std::io::Error> for ProbeErr {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => ProbeErr::TruncatedInput,
            // std reports an elapsed socket timeout as either of these,
            // depending on the platform.
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => ProbeErr::Timeout,
            _ => ProbeErr::IoErr(err),
        }
    }
}

impl From<std::time::SystemTimeError> for ProbeErr {
    fn from(err: std::time::SystemTimeError) -> Self {
        ProbeErr::InternalErr(err.to_string())
    }
}

impl From<std::num::ParseIntError> for ProbeErr {
    fn from(err: std::num::ParseIntError) -> Self {
        ProbeErr::MalformedField(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_errors_map_onto_taxonomy() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(ProbeErr::from(eof), ProbeErr::TruncatedInput));

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(ProbeErr::from(timed_out), ProbeErr::Timeout));

        let would_block = io::Error::new(io::ErrorKind::WouldBlock, "slow");
        assert!(matches!(ProbeErr::from(would_block), ProbeErr::Timeout));

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "nope");
        assert!(matches!(ProbeErr::from(refused), ProbeErr::IoErr(_)));
    }

    #[test]
    fn parse_int_errors_are_malformed_fields() {
        let err = "abc".parse::<i32>().unwrap_err();
        assert!(matches!(ProbeErr::from(err), ProbeErr::MalformedField(_)));
    }
}
