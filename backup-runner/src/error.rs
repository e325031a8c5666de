//! Errors surfaced by the external dump/restore tools.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {detail}")]
    Failed {
        tool: String,
        status: std::process::ExitStatus,
        detail: String,
    },
}
