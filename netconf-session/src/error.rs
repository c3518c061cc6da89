use crate::message::{RpcError, RpcReply};
use thiserror::Error;

pub type NetconfClientResult<T> = Result<T, NetconfClientError>;

#[derive(Debug, Error)]
pub enum NetconfClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "async-ssh2-lite")]
    #[error(transparent)]
    Ssh(#[from] async_ssh2_lite::Error),
    #[error("failed to encode rpc request: {0}")]
    Encoding(#[source] quick_xml::DeError),
    #[error("failed to decode rpc reply: {source}")]
    Decoding {
        #[source]
        source: quick_xml::DeError,
        raw: String,
    },
    #[error("remote procedure call failed: {error}")]
    Rpc {
        error: RpcError,
        reply: Box<RpcReply>,
    },
    #[error("connection closed before the server sent <hello>")]
    HelloNotReceived,
    #[error("malformed server <hello>: {0}")]
    MalformedHello(String),
    #[error("message-id must not be empty")]
    InvalidMessageId,
    #[error("rpc request must contain at least one method")]
    EmptyRequest,
    #[error("a request with message-id '{0}' is already waiting for a reply")]
    DuplicateMessageId(String),
    #[error("reply reader stopped: {0}")]
    ReaderClosed(String),
    #[error("session is closed")]
    SessionClosed,
    #[error("unknown datastore {}, (expected {:?})", unknown, expected)]
    UnknownDatastore {
        expected: Vec<String>,
        unknown: String,
    },
    #[error(
        "malformed message chunk (expected {:?}, actual {:?})",
        expected,
        actual
    )]
    MalformedChunk { expected: char, actual: char },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl NetconfClientError {
    pub fn new(msg: String) -> Self {
        NetconfClientError::Anyhow(anyhow::Error::msg(msg))
    }

    /// The reply that carried a fatal `<rpc-error>`, if the peer answered at all.
    pub fn reply(&self) -> Option<&RpcReply> {
        match self {
            NetconfClientError::Rpc { reply, .. } => Some(&**reply),
            _ => None,
        }
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, NetconfClientError::Rpc { .. })
    }
}
