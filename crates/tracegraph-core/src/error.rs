use std::path::PathBuf;
use thiserror::Error;

/// Failure to ingest a graph or trace document.
///
/// The layout engine itself has no fatal errors; this only covers the edge
/// where documents enter the system.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document: {0}")]
    Parse(#[source] serde_json::Error),
}
