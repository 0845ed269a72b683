use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, GenerateError>;

#[derive(thiserror::Error, Debug)]
pub enum GenerateError {
    #[error("invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },
    #[error("failed to enumerate source directory {}: {reason}", path.display())]
    Enumeration {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<io::Error>,
    },
    #[error("failed to decode image {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode PNG {}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to stat output file {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GenerateError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn enumeration(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Enumeration {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Short tag for the pipeline step that failed.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Enumeration { .. } => "enumerate",
            Self::Decode { .. } => "decode",
            Self::Encode { .. } => "encode",
            Self::Stat { .. } => "stat",
        }
    }
}
