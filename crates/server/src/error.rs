use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must be a port number (1-65535), got {value:?}")]
    InvalidPort { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be one of: smtp, log; got {value:?}")]
    InvalidNotifier { var: &'static str, value: String },

    #[error("{var} must list at least one address")]
    EmptyRecipients { var: &'static str },
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SMTP server rejected {stage}: {code} {message}")]
    Rejected {
        stage: &'static str,
        code: u16,
        message: String,
    },

    #[error("SMTP protocol error: {0}")]
    Protocol(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("refusing to send credentials to {0} over an unencrypted connection")]
    InsecureAuth(String),

    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}
