//! appkeeper - keep locally installed artifacts in step with their upstream
//! releases.
//!
//! appkeeper tracks a configured list of applications, each pointing at a
//! source (a GitHub repository or a direct artifact URL), and runs a
//! repeatable pipeline per application: scan the install directory for the
//! current version, fetch the source's releases, pick the asset compatible
//! with this machine, compare versions, then download, verify, and rotate the
//! new artifact into place behind a stable symlink.
//!
//! # Module map
//!
//! - [`version`] - version extraction from arbitrary filenames and ordering
//! - [`compat`] - architecture/platform/distro asset filtering
//! - [`repository`] - source abstraction (GitHub releases, direct URLs)
//! - [`checker`] - per-application update decision
//! - [`checksum`] - digest computation and checksum-file parsing
//! - [`download`] - bounded-concurrency downloads and archive extraction
//! - [`rotation`] - atomic suffix-rotation install and symlink management
//! - [`net`] - shared HTTP client and retry discipline
//! - [`config`] - TOML configuration
//! - [`report`] - structured per-application outcomes
//! - [`core`] - error taxonomy and cancellation
//! - [`cli`] - the command-line surface
//!
//! All remote interaction flows through [`repository::RepositoryClient`] and
//! one shared `reqwest` client, so the pipeline is testable against mock
//! sources without network access.

pub mod checker;
pub mod checksum;
pub mod cli;
pub mod compat;
pub mod config;
pub mod core;
pub mod download;
pub mod net;
pub mod report;
pub mod repository;
pub mod rotation;
pub mod version;
