//! # Image Analysis Server
//!
//! Holds the analysis [`Session`] (image, selected algorithm, parameters,
//! result) and exposes it as MCP tools over stdio.
//!
//! ```rust
//! use std::sync::Arc;
//! use algo_server::{Session, SessionState};
//! use algos::{AlgoRegistry, Dispatcher};
//!
//! let registry = Arc::new(AlgoRegistry::builtin()?);
//! let session = Session::new(Arc::new(Dispatcher::builder(registry).with_builtin(None).build()));
//!
//! session.select_algorithm("otsu_threshold")?;
//! assert_eq!(session.state(), SessionState::AlgoSelected);
//! session.clear();
//! assert_eq!(session.state(), SessionState::Empty);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod mcp;
pub mod session;

pub use config::ServerConfig;
pub use error::{CodecError, ConfigError, ErrorKind, Result, SessionError};
pub use mcp::AlgoMcpServer;
pub use session::{Session, SessionState, SessionStatus};
