//! Single source of truth for hearth filesystem layout.
//!
//! This module defines WHERE data lives. No I/O, no validation.
//!
//! ```text
//! ~/.hearth/
//! ├── config.toml          # Global config
//! └── run/                 # Runtime state (0700)
//!     ├── serve.sock       # Unix domain socket (0600)
//!     └── serve.token      # Bearer token for TCP mode (0600)
//!
//! farm_memory/
//! └── db/rag.db            # Default chunk store (relative to cwd)
//! ```

use std::path::PathBuf;

/// User's hearth home directory: `~/.hearth/`
pub fn hearth_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hearth")
}

/// Global config file: `~/.hearth/config.toml`
pub fn config_path() -> PathBuf {
    hearth_home().join("config.toml")
}

/// Default chunk database: `farm_memory/db/rag.db`
pub fn default_db_path() -> PathBuf {
    PathBuf::from("farm_memory").join("db").join("rag.db")
}

/// Serve daemon paths
pub mod serve {
    use super::*;

    /// Socket file name inside the run directory
    pub const SOCKET_FILE: &str = "serve.sock";

    /// Token file name inside the run directory
    pub const TOKEN_FILE: &str = "serve.token";

    /// Runtime directory: `~/.hearth/run/`
    pub fn run_dir() -> PathBuf {
        hearth_home().join("run")
    }
}
