//! Offline integration tests.
//!
//! These drive the update pipeline end to end against a mock repository
//! source and temporary directories; nothing touches the network.

mod common;
mod install_flow;
mod pipeline;
