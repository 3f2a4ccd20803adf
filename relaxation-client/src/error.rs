//! Error types for the relaxation client.

use std::{fmt, io, net::SocketAddr};

use thiserror::Error;

use crate::codec::MalformedMessage;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Which send in the exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStage {
    /// The first report, right after connecting.
    Initial,
    /// A report following a temperature update.
    Update,
}

impl fmt::Display for SendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendStage::Initial => f.write_str("initial message"),
            SendStage::Update => f.write_str("updated temperature"),
        }
    }
}

/// Fatal failures. None of them are retried.
///
/// A coordinator closing the stream is not an error here; it surfaces as
/// [`crate::connection::Received::Closed`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unable to connect to {addr}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("unable to send {stage}")]
    Send {
        stage: SendStage,
        #[source]
        source: io::Error,
    },

    #[error("error while receiving coordinator message")]
    Recv(#[source] io::Error),

    #[error("protocol desync")]
    Malformed(#[from] MalformedMessage),
}

impl ClientError {
    /// Short machine-friendly tag used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Connect { .. } => "connect",
            ClientError::Send { .. } => "send",
            ClientError::Recv(_) => "recv",
            ClientError::Malformed(_) => "malformed_message",
        }
    }
}
