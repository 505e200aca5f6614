//! Tests for the mailsieve console library.
//!
//! Most tests drive a [`crate::controller::Controller`] against the recording
//! mock server in [`support`]; poll loops are fed by hand through
//! `Controller::on_tick`.
//!
//! ## Test Modules
//!
//! - **support**: mock transport, manual ticks and the server page fixtures
//! - **controller_tests**: bootstrap, navigation, accounts, forms and addresses
//! - **scan_tests**: the scan live-update loop and scan commands
//! - **results_tests**: result processing and its status loop
//! - **rows_tests**: filter, prompt and result-file row editing
//! - **modal_tests**: the batched email viewer
//! - **fragment_tests**: parsing of the shell and content fragments
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error display and input validation
//! - **http_transport_tests**: the reqwest transport against a local axum server
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test
//! cargo test rows_tests
//! ```

pub mod support;

pub mod config_tests;
pub mod http_transport_tests;
