pub use log::{LevelFilter, debug, error, info, trace, warn};

/// Install the process-wide log sink. Call once, before device creation.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .try_init()
}
