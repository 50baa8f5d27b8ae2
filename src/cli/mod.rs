// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface: argument parsing, console logging and one runner per
//! subcommand.

/// CLI arguments.
pub mod args;

/// `export` subcommand.
pub mod export;

/// Console logging macros.
pub mod logging;

/// `names` subcommand.
pub mod names;

/// `predict` subcommand.
pub mod predict;

/// `video` subcommand.
pub mod video;
