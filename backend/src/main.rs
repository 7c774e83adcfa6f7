//! Main entry point for the ToolHub backend.
//!
//! This file starts the Axum web server defined in the library crate and
//! turns a startup failure into a non-zero exit code.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match toolhub::start_server().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("toolhub failed: {err}");
            ExitCode::FAILURE
        }
    }
}
