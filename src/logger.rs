//! Serial console and the `log` backend.
//!
//! Everything goes to COM1. The port is only ever touched with interrupts
//! masked, so an interrupt handler that logs cannot spin on a lock held by
//! the code it interrupted.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;
use uart_16550::SerialPort;

use crate::arch::without_interrupts;
use crate::config::SERIAL_PORT;

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(SERIAL_PORT) });

#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        $crate::logger::_print(format_args!("{}\n", format_args!($($arg)*)));
    }};
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    without_interrupts(|| {
        let _ = SERIAL.lock().write_fmt(args);
    });
}

/// Raw bytes, for the `write` system call.
pub fn write_bytes(bytes: &[u8]) {
    without_interrupts(|| {
        let mut serial = SERIAL.lock();
        bytes.iter().for_each(|&b| serial.send(b));
    });
}

struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        _print(format_args!("[{}] {}: {}\n", tag, record.target(), record.args()));
    }

    fn flush(&self) {}
}

/// Bring up COM1 and install the logger.
pub fn init(level: LevelFilter) -> Result<(), &'static str> {
    without_interrupts(|| SERIAL.lock().init());
    log::set_logger(&LOGGER).map_err(|_| "logger already installed")?;
    log::set_max_level(level);
    Ok(())
}
