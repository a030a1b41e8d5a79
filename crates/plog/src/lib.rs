//! SDK logging subsystem.
//!
//! Lines are formatted as `<colour>[LEVEL]<reset> message` and handed to a
//! single sink installed at init. On the console that sink is the DUART TTY;
//! if nothing is installed, output is dropped. Code using the `log` facade
//! lands in the same sink once [`init`] has run.
#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::Once;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m", // Gray
            Level::Debug => "\x1b[36m", // Cyan
            Level::Info => "\x1b[32m",  // Green
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Error => "\x1b[31m", // Red
        }
    }

    const fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Level::Trace,
            log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

impl From<Level> for log::LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => log::LevelFilter::Trace,
            Level::Debug => log::LevelFilter::Debug,
            Level::Info => log::LevelFilter::Info,
            Level::Warn => log::LevelFilter::Warn,
            Level::Error => log::LevelFilter::Error,
        }
    }
}

/// Receives one formatted line per call.
pub type Sink = fn(fmt::Arguments);

/// Set once; read lock-free so interrupt handlers can log.
static SINK: Once<Sink> = Once::new();

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

struct FacadeLogger;

impl log::Log for FacadeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        Level::from(metadata.level()) >= min_level()
    }

    fn log(&self, record: &log::Record) {
        log(record.level().into(), *record.args());
    }

    fn flush(&self) {}
}

static FACADE: FacadeLogger = FacadeLogger;

/// Install the output sink and the minimum level.
///
/// Only the first call installs a sink; later calls just move the level.
pub fn init(sink: Sink, level: Level) {
    SINK.call_once(|| sink);
    set_level(level);
    // Fails only if another `log` backend is already installed.
    #[cfg(target_has_atomic = "ptr")]
    let _ = log::set_logger(&FACADE);
    // SAFETY: without compare-and-swap the console runs init before
    // interrupts are enabled, so nothing can race this store.
    #[cfg(not(target_has_atomic = "ptr"))]
    let _ = unsafe { log::set_logger_racy(&FACADE) };
}

/// Install the DUART TTY as the sink, if a DUART is fitted.
#[cfg(target_arch = "mips")]
pub fn init_tty(level: Level) -> bool {
    fn tty_sink(args: fmt::Arguments) {
        // SAFETY: the TTY only touches the expansion 2 registers.
        let mut hw = unsafe { phal::mmio::Mmio::new() };
        phal::tty::write_fmt(&mut hw, args);
    }

    let mut hw = unsafe { phal::mmio::Mmio::new() };
    if !phal::tty::init(&mut hw) {
        return false;
    }
    init(tty_sink, level);
    true
}

pub fn set_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
    log::set_max_level(level.into());
}

pub fn min_level() -> Level {
    Level::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

/// Log a message with a specific level
pub fn log(level: Level, args: fmt::Arguments) {
    if level < min_level() {
        return;
    }
    if let Some(sink) = SINK.get() {
        sink(format_args!("{}[{}]\x1b[0m {}\n", level.color(), level.as_str(), args));
    }
}

/// Print to the sink without formatting
pub fn print(args: fmt::Arguments) {
    if let Some(sink) = SINK.get() {
        sink(args);
    }
}

/// Log at TRACE level
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Trace, format_args!($($arg)*))
    };
}

/// Log at DEBUG level
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Debug, format_args!($($arg)*))
    };
}

/// Log at INFO level
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Info, format_args!($($arg)*))
    };
}

/// Log at WARN level
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Warn, format_args!($($arg)*))
    };
}

/// Log at ERROR level
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Error, format_args!($($arg)*))
    };
}

/// Print without newline
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::print(format_args!($($arg)*))
    };
}

/// Print with newline
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => {{
        $crate::print(format_args!($($arg)*));
        $crate::print(format_args!("\n"));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static CAPTURED: Mutex<String> = Mutex::new(String::new());

    fn capture(args: fmt::Arguments) {
        use std::fmt::Write;
        let _ = CAPTURED.lock().unwrap().write_fmt(args);
    }

    #[test]
    fn lines_are_tagged_filtered_and_shared_with_the_facade() {
        init(capture, Level::Info);

        crate::debug!("dropped {}", 1);
        crate::warn!("CD sync timeout");
        log::error!("from the facade");

        let out = CAPTURED.lock().unwrap().clone();
        assert!(!out.contains("dropped"));
        assert!(out.contains("\x1b[33m[ WARN]\x1b[0m CD sync timeout\n"));
        assert!(out.contains("\x1b[31m[ERROR]\x1b[0m from the facade\n"));
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(Level::Trace < Level::Error);
        assert_eq!(Level::from(log::Level::Warn), Level::Warn);
        assert_eq!(Level::from_u8(9), Level::Error);
    }
}
