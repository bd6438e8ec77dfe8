use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not connect to notification daemon at {}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error while talking to the notification daemon")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode notification list")]
    Decode(#[from] serde_json::Error),
    #[error("Notification daemon sent more than {0} bytes")]
    ReplyTooLarge(usize),
    #[error("Notification daemon did not respond within {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Whether the daemon could not be reached at all, as opposed to misbehaving once connected.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Error::Connect { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
