use std::{io, path::Path, sync::mpsc::SendError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "service")]
use notify::{Error as NotifyError, ErrorKind as NotifyErrorKind};

use crate::event::Event;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum BibnoteError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Document already has a section for key '{0}'")]
    DuplicateKey(String),
    #[error("Key '{0}' cannot be written as an @key citation")]
    InvalidKey(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("No section found for key '{0}'")]
    KeyNotFound(String),
    #[error("File does not exist: {0}")]
    MissingFile(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Bibliography parse error: {0}")]
    Parse(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File watcher error: {0}")]
    Watch(String),
}

impl BibnoteError {
    pub fn missing_file<P: AsRef<Path>>(path: P) -> Self {
        BibnoteError::MissingFile(path.as_ref().display().to_string())
    }

    /// Soft failures leave the sync loop running; everything else ends the current conversion.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BibnoteError::KeyNotFound(_) | BibnoteError::DuplicateKey(_) | BibnoteError::InvalidKey(_)
        )
    }
}

impl From<toml::de::Error> for BibnoteError {
    fn from(src: toml::de::Error) -> BibnoteError {
        BibnoteError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for BibnoteError {
    fn from(src: toml::ser::Error) -> BibnoteError {
        BibnoteError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<serde_yaml::Error> for BibnoteError {
    fn from(src: serde_yaml::Error) -> BibnoteError {
        BibnoteError::Serialization(format!("YAML (de)serialization error: {src}"))
    }
}

impl From<io::Error> for BibnoteError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => BibnoteError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => BibnoteError::PermissionDenied,
            _ => BibnoteError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<SendError<Event>> for BibnoteError {
    fn from(x: SendError<Event>) -> Self {
        BibnoteError::Io(format!(
            "Channel update send Error, could not transmit sync event {}",
            x.0
        ))
    }
}

#[cfg(feature = "service")]
impl From<NotifyError> for BibnoteError {
    fn from(notify_error: NotifyError) -> Self {
        match notify_error.kind {
            NotifyErrorKind::Generic(msg) => BibnoteError::Watch(format!(
                "notify-debouncer: {}, paths: {:?}",
                msg, notify_error.paths
            )),
            NotifyErrorKind::Io(io_error) => BibnoteError::Watch(format!(
                "notify-debouncer: io error {}, paths: {:?}",
                io_error.kind(),
                notify_error.paths
            )),
            NotifyErrorKind::PathNotFound => BibnoteError::NotFound(format!(
                "notify-debouncer: path(s) not found: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::WatchNotFound => BibnoteError::NotFound(format!(
                "notify-debouncer: watch not found, paths: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::InvalidConfig(_) => {
                BibnoteError::Watch("notify-debouncer invalid config".to_string())
            }
            NotifyErrorKind::MaxFilesWatch => {
                BibnoteError::Watch("notify-debouncer max file watch limit reached".to_string())
            }
        }
    }
}
