use thiserror::Error;

use crate::message::KvMessage;

/// text carried by a successful put/del response
pub const SUCCESS: &str = "Success";

/// type alias for all operations in this crate that could fail with a [`KvsError`]
pub type Result<T> = std::result::Result<T, KvsError>;

/// The error variants used throughout the crate.
///
/// Every variant that can travel over the wire displays as a fixed string. A client can match
/// against that string, and [`KvsError::from_message`] turns it back into the same variant.
#[derive(Error, Debug)]
pub enum KvsError {
    /// the key was empty or missing
    #[error("Invalid Key")]
    InvalidKey,

    /// the value was empty or missing
    #[error("Invalid Value")]
    InvalidValue,

    /// the key does not exist in the authoritative store
    #[error("Data Error: Key does not exist")]
    NoSuchKey,

    /// a message or snapshot document could not be parsed
    #[error("Unknown Error: Could not parse")]
    InvalidFormat,

    /// the server address could not be turned into a socket
    #[error("Could not create socket")]
    CouldNotCreateSocket,

    /// a connection to the server could not be established or used
    #[error("Could not connect")]
    CouldNotConnect,

    /// the socket could not be closed after the exchange
    #[error("Could not close socket")]
    CouldNotClose,

    /// a failure reported by the server whose text is not one of the known variants
    #[error("{0}")]
    Server(String),

    /// variant for errors caused by file or listener IO
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// invalid command line options or configuration
    #[error("{0}")]
    Parsing(String),
}

impl KvsError {
    /// maps the `message` text of a response back into the matching error variant.
    /// Text that is not recognized is kept verbatim in [`KvsError::Server`]
    pub fn from_message(text: &str) -> KvsError {
        match text {
            "Invalid Key" => KvsError::InvalidKey,
            "Invalid Value" => KvsError::InvalidValue,
            "Data Error: Key does not exist" => KvsError::NoSuchKey,
            "Unknown Error: Could not parse" => KvsError::InvalidFormat,
            "Could not create socket" => KvsError::CouldNotCreateSocket,
            "Could not connect" => KvsError::CouldNotConnect,
            "Could not close socket" => KvsError::CouldNotClose,
            other => KvsError::Server(other.to_string()),
        }
    }

    /// builds the response that reports this error to a peer: only the `Message` field is set
    pub fn to_response(&self) -> KvMessage {
        KvMessage::failure(self.to_string())
    }
}
