//! # Mailsieve Console Library
//!
//! Client-side controller for the mailsieve email filtering server. It loads
//! the server's HTML pages, keeps a model of what the user sees and turns
//! user gestures into the same requests the browser front-end would send.
//!
//! ## Architecture
//!
//! The library is built using:
//! - **Tokio**: single-threaded runtime with a `LocalSet` for commands and poll ticks
//! - **Reqwest**: HTTP transport with a cookie store and the CSRF header
//! - **Scraper**: parsing of server-rendered shell and content fragments
//! - **Serde**: JSON request and reply bodies
//!
//! ## Core Components
//!
//! - [`api`]: typed endpoint calls over a pluggable [`api::Transport`]
//! - [`command_line`]: console input grammar
//! - [`config`]: layered configuration (embedded defaults, file, environment)
//! - [`controller`]: command dispatch and the live-update loops
//! - [`error`]: the crate error type and input validation
//! - [`metrics`]: per-session counters
//! - [`page`]: the page model, flash messages and HTML fragment parsing
//! - [`poller`]: cancellable interval ticks for scan and result status
//! - [`render`]: plain-text rendering of the page
//! - [`state`]: selected account and running poll loops
//! - [`types`]: wire identifiers, replies and request bodies

pub mod api;
pub mod command_line;
pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod page;
pub mod poller;
pub mod render;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
