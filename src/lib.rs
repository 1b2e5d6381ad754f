#![allow(dead_code)]
#![allow(unused_imports)]

/*!
`quad` is the front-of-house web layer for the university portal: it
serves the login, registration, and dashboard pages, keeps each visitor's
session in a file-backed store, and performs all of its data operations
against the upstream REST API.
*/

pub mod api;
pub mod config;
pub mod inter;
pub mod models;
pub mod session;
pub mod user;

use smallstr::SmallString;
use time::{
    format_description::FormatItem,
    macros::format_description,
    Date, OffsetDateTime,
};

/// String type for short formatted fragments that shouldn't allocate.
pub type MiniString<T> = SmallString<T>;

/// Wire format for every date the API exchanges (`2026-03-01`).
pub const DATE_FMT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Today, UTC. Good enough for date-range defaults.
pub fn now() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn log_level_from_env() -> simplelog::LevelFilter {
    use simplelog::LevelFilter;

    let mut level_string = match std::env::var("LOG_LEVEL") {
        Err(_) => { return LevelFilter::Warn; },
        Ok(s) => s,
    };

    level_string.make_ascii_lowercase();
    match level_string.as_str() {
        "max" => LevelFilter::max(),
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn ensure_logging() {
        use simplelog::{TermLogger, TerminalMode, ColorChoice};
        let log_cfg = simplelog::ConfigBuilder::new()
            .add_filter_allow_str("quad")
            .build();
        let res = TermLogger::init(
            log_level_from_env(),
            log_cfg,
            TerminalMode::Stdout,
            ColorChoice::Auto
        );

        match res {
            Ok(_) => { log::info!("Test logging started."); },
            Err(_) => { log::info!("Test logging already started."); },
        }
    }
}
