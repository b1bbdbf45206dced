/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::fmt;

use serde::{Deserialize, Serialize};
use simplelog::{
    ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to initialize logging: {0}")]
    Init(#[from] log::SetLoggerError),
}

/// Targets that flood the log at debug level.
const NOISY_TARGETS: &[&str] =
    &["hyper", "hyper_util", "reqwest", "want", "mio"];

#[derive(
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    Debug,
)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Warning,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    /// Map a repeated `-v` flag count onto a verbosity, starting at info.
    pub fn from_occurrences(count: u8) -> Self {
        match count {
            0 => Self::Info,
            1 => Self::Debug,
            2.. => Self::Trace,
        }
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Warning => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "Warning"),
            Self::Info => write!(f, "Info"),
            Self::Debug => write!(f, "Debug"),
            Self::Trace => write!(f, "Trace"),
        }
    }
}

/// Install a terminal logger writing to stderr.
pub fn init(verbosity: Verbosity) -> Result<()> {
    let mut config = ConfigBuilder::new();
    for target in NOISY_TARGETS {
        config.add_filter_ignore_str(*target);
    }
    TermLogger::init(
        verbosity.level_filter(),
        config.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_from_flag_count() {
        assert_eq!(Verbosity::from_occurrences(0), Verbosity::Info);
        assert_eq!(Verbosity::from_occurrences(1), Verbosity::Debug);
        assert_eq!(Verbosity::from_occurrences(5), Verbosity::Trace);
    }

    #[test]
    fn verbosity_levels_are_ordered() {
        assert!(Verbosity::Warning < Verbosity::Info);
        assert!(Verbosity::Debug < Verbosity::Trace);
        assert_eq!(Verbosity::Debug.level_filter(), LevelFilter::Debug);
    }
}
