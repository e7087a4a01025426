//! Injectable log sink for build progress and tool diagnostics

/// Destination for user-facing build messages
pub trait Console {
    fn log(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards messages to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConsole;

impl Console for LogConsole {
    fn log(&self, message: &str) {
        log::info!("{}", message);
    }

    fn error(&self, message: &str) {
        log::error!("{}", message);
    }
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentConsole;

impl Console for SilentConsole {
    fn log(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}
