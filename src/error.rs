use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    ParseGeometry(#[from] crate::geometry::ParseError),

    #[error(transparent)]
    ParsePolicy(#[from] crate::policy::ParseError),

    #[error(transparent)]
    ParseRunIdentity(#[from] crate::run::ParseError),

    #[error("{path:?}: line {line}: {reason}")]
    Report {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("configuration index {index} out of range ({len} configurations)")]
    UnknownConfiguration { index: usize, len: usize },

    #[error("{path:?} does not match the layout of {reference:?}: {reason}")]
    Misaligned {
        path: PathBuf,
        reference: PathBuf,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fs(#[from] utils::fs::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
