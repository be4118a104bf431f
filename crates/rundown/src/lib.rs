//! # Rundown
//!
//! Deterministic reverse-order teardown for externally-acquired
//! resources — handles, connections, listeners.
//!
//! A [`Manager`] tracks resources as their acquisitions complete and
//! tears every one of them down exactly once, newest first, when
//! [`Manager::close`] runs or an acquisition fails. Teardown is
//! best-effort and report-all: a failing release never stops the
//! drain, and every failure travels on the surfaced error — the first
//! as primary, the rest as its [`secondary`](Error::secondary) chain.
//! Optional per-action deadlines bound acquire and release without
//! cancelling them.
//!
//! ```
//! use std::net::TcpListener;
//! use std::sync::Arc;
//!
//! use rundown::Manager;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> rundown::Result<()> {
//! let manager = Manager::new();
//!
//! let listener = manager
//!     .add(
//!         || async { Ok::<_, std::io::Error>(TcpListener::bind("127.0.0.1:0")?) },
//!         |listener: Arc<TcpListener>| {
//!             drop(listener);
//!             Ok::<_, std::io::Error>(())
//!         },
//!     )
//!     .await?;
//!
//! assert!(listener.local_addr().is_ok());
//!
//! // Tears down everything registered, newest first.
//! manager.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod deadline;
pub mod error;
pub mod manager;

pub use action::{IntoAcquire, IntoRelease};
pub use config::ManagerConfig;
pub use error::{BoxError, Error, ErrorKind, Result, SharedError};
pub use manager::{Lifecycle, Manager, ManagerStats};
