//! Generic logger utility functions
//!
//! Records go to stderr, with coloured level tags, and to the session's log file as plain text.
//! Stdout is never written to since executables use it as a reply channel.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern::{Dispatch, FormatCallback};
use colored::Colorize;
use std::fmt;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of `INFO` or more verbose, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// # Notes
///
/// - `min_level` must be `Info`, `Debug` or `Trace`, warnings and errors are never hidden.
/// - Debug and trace records include their target.
///
/// # Safety
///
/// - This function must only be called once to prevent corrupting logs.
pub fn logger_init(
    min_level: self::LevelFilter,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let log_file = fern::log_file(session.log_file_path.clone())
        .map_err(LoggerInitError::LogFileInitError)?;

    let stderr = Dispatch::new()
        .format(|out, message, record| {
            let tag = match record.level() {
                log::Level::Trace => "TRC".dimmed().italic(),
                log::Level::Debug => "DBG".dimmed(),
                log::Level::Info  => "INF".normal(),
                log::Level::Warn  => "WRN".yellow(),
                log::Level::Error => "ERR".red().bold()
            };
            write_record(out, tag, message, record)
        })
        .chain(std::io::stderr());

    let file = Dispatch::new()
        .format(|out, message, record| {
            let tag = match record.level() {
                log::Level::Trace => "TRC",
                log::Level::Debug => "DBG",
                log::Level::Info  => "INF",
                log::Level::Warn  => "WRN",
                log::Level::Error => "ERR"
            };
            write_record(out, tag, message, record)
        })
        .chain(log_file);

    Dispatch::new()
        .level(min_level)
        .chain(stderr)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    info!("    Session epoch: {}", session::get_epoch());
    info!("    Log level: {:?}", min_level);
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn write_record<T: fmt::Display>(
    out: FormatCallback,
    tag: T,
    message: &fmt::Arguments,
    record: &log::Record
) {
    if record.level() > log::Level::Info {
        out.finish(format_args!(
            "[{:10.6} {}] {}: {}",
            session::get_elapsed_seconds(),
            tag,
            record.target(),
            message
        ))
    }
    else {
        out.finish(format_args!(
            "[{:10.6} {}] {}",
            session::get_elapsed_seconds(),
            tag,
            message
        ))
    }
}
