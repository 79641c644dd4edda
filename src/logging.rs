use std::path::Path;

use anyhow::{Context, Result};
use flexi_logger::{Duplicate, FileSpec, Logger as FlexiLogger, WriteMode};
use log::LevelFilter;

use crate::config::Logger;

pub fn init(config: &Logger, debug: bool) -> Result<()> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        parse_level(&config.level)
    };

    let mut logger = FlexiLogger::try_with_str(level.as_str())
        .context("init logger")?
        .format(flexi_logger::detailed_format)
        .duplicate_to_stderr(Duplicate::Warn);

    if !config.path.trim().is_empty() {
        let spec = FileSpec::try_from(Path::new(&config.path))?;
        logger = logger
            .log_to_file(spec)
            .write_mode(WriteMode::BufferAndFlush);
    }

    logger.start()?;
    Ok(())
}

fn parse_level(raw: &str) -> LevelFilter {
    match raw.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}
