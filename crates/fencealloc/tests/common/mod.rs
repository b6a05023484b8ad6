//! Shared test support: a capturing logger so tests can assert on the
//! allocator's diagnostic messages.

use log::{Log, Metadata, Record};
use std::sync::{Mutex, OnceLock};

#[derive(Default)]
pub struct CaptureLogger {
    messages: Mutex<Vec<String>>,
}

impl CaptureLogger {
    /// Install the process-wide capture logger (idempotent) and return it.
    pub fn install() -> &'static CaptureLogger {
        static LOGGER: OnceLock<CaptureLogger> = OnceLock::new();
        let logger = LOGGER.get_or_init(CaptureLogger::default);
        // set_logger fails after the first call; every caller shares the
        // same sink.
        let _ = log::set_logger(logger);
        log::set_max_level(log::LevelFilter::Debug);
        logger
    }

    /// Number of captured messages containing every given substring.
    pub fn count_containing(&self, needles: &[&str]) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| needles.iter().all(|needle| msg.contains(needle)))
            .count()
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("{}", record.args()));
    }

    fn flush(&self) {}
}
