use std::path::PathBuf;

use crate::decode::SassError;
use crate::indented::SyntaxError;

#[derive(Debug, thiserror::Error)]
pub enum Errcode {
    // Compilation
    #[error("indented syntax: {0}")]
    IndentedSyntax(#[from] SyntaxError),
    #[error("{0}")]
    Compile(#[from] SassError),

    // Configuration
    #[error("unable to read config file {0:?}: {1}")]
    ConfigFileRead(PathBuf, #[source] std::io::Error),
    #[error("unable to decode config file: {0}")]
    TomlDecode(#[from] toml::de::Error),

    // Files
    #[error("unable to read {0:?}: {1}")]
    InputRead(PathBuf, #[source] std::io::Error),
    #[error("unable to write {0:?}: {1}")]
    OutputWrite(PathBuf, #[source] std::io::Error),
}

impl Errcode {
    /// The compiler's own diagnostic, if that is what failed.
    pub fn sass_error(&self) -> Option<&SassError> {
        match self {
            Errcode::Compile(e) => Some(e),
            _ => None,
        }
    }
}
