//! Logging setup and per-queue log targets
//!
//! Process-wide logging goes through `flexi_logger`; queue components log
//! with the `log` macros under a [`QueueLogger`] target suffixed with the
//! owning machine and machine module ids, so the output of one acquisition
//! can be filtered with a level string like `cncqueue::queue::configurable.12.3=debug`.

use crate::queue::traits::MachineIdentity;

// Global static logger handle for flexi_logger
static LOGGER_HANDLE: std::sync::OnceLock<std::sync::Mutex<flexi_logger::LoggerHandle>> =
    std::sync::OnceLock::new();

/// Log target of a queue component owned by a machine module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLogger {
    target: String,
}

impl QueueLogger {
    /// Logger of `component` for the given owner
    pub fn new(component: &str, owner: MachineIdentity) -> Self {
        Self {
            target: format!("{}.{}", component, owner),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Start process logging
///
/// `log_format` is `text` (default), `ext` (with the source location) or
/// `json`. Output goes to stderr, or to `log_file` when given.
pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
    color_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    use flexi_logger::{FileSpec, Logger};

    let level_str = log_level.unwrap_or("info");
    let format_type = log_format.map_or("text", |f| f);

    let mut logger = Logger::try_with_str(level_str)?;

    match format_type {
        "json" => {
            logger = logger.format(json_format);
        }
        "ext" => {
            if color_enabled {
                logger = logger.format(extended_color_format);
            } else {
                logger = logger.format(extended_format);
            }
        }
        _ => {
            if color_enabled {
                logger = logger.format(simple_color_format);
            } else {
                logger = logger.format(simple_format);
            }
        }
    }

    if let Some(file_path) = log_file {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger.log_to_file(file_spec);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(std::sync::Mutex::new(handle));

    Ok(())
}

/// Change the log levels of a running logger
///
/// Only the level string can change at runtime; format and output are fixed
/// by [`init_logging`].
pub fn reconfigure_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let handle_mutex = LOGGER_HANDLE
        .get()
        .ok_or("Logger handle not initialised. Call init_logging first.")?;
    let mut handle = handle_mutex
        .lock()
        .map_err(|_| "Could not acquire logger handle lock")?;
    handle.parse_and_push_temp_spec(log_level)?;
    Ok(())
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

// "YYYY-MM-DD HH:mm:ss.fff INF message", plus " (queue/fixed.rs.1.0:42)"
// when the location is shown
fn write_line(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
    color: bool,
    location: bool,
) -> Result<(), std::io::Error> {
    use colored::*;

    let timestamp = now.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
    let abbr = level_abbr(record.level());
    if !color {
        write!(w, "{} {} {}", timestamp, abbr, record.args())?;
        if location {
            write!(w, " ({})", format_target_as_path(record.target(), record.line()))?;
        }
        return Ok(());
    }

    let level = match record.level() {
        log::Level::Error => abbr.red().bold(),
        log::Level::Warn => abbr.yellow(),
        log::Level::Info => abbr.green(),
        log::Level::Debug => abbr.blue(),
        log::Level::Trace => abbr.magenta(),
    };
    write!(w, "{} {} {}", timestamp.dimmed(), level, record.args())?;
    if location {
        let path = format!("({})", format_target_as_path(record.target(), record.line()));
        write!(w, " {}", path.dimmed())?;
    }
    Ok(())
}

fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write_line(w, now, record, false, false)
}

fn simple_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write_line(w, now, record, true, false)
}

fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write_line(w, now, record, false, true)
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write_line(w, now, record, true, true)
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use serde_json::{json, to_string};

    let json_obj = json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr(record.level()),
        "message": record.args().to_string(),
        "target": record.target(),
        "location": format_target_as_path(record.target(), record.line()),
    });

    match to_string(&json_obj) {
        Ok(json_string) => w.write_all(json_string.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"Failed to serialize log message\"}"),
    }
}

// cncqueue::queue::memory -> queue/memory.rs, keeping any owner suffix
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = if let Some(without_prefix) = target.strip_prefix("cncqueue::") {
        let (module, owner) = match without_prefix.split_once('.') {
            Some((module, owner)) => (module, Some(owner)),
            None => (without_prefix, None),
        };
        let mut path = module.replace("::", "/") + ".rs";
        if let Some(owner) = owner {
            path.push('.');
            path.push_str(owner);
        }
        path
    } else {
        target.replace("::", "/")
    };

    if let Some(line_num) = line {
        format!("{}:{}", path_like, line_num)
    } else {
        path_like
    }
}
