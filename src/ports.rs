//! Host capabilities the actions report through: user-facing notices and
//! opening a URL. The console implementations back the CLI; tests substitute
//! recorders.

use log::{error, info, warn};

use crate::config::NotificationStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            level: NoticeLevel::Info,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            level: NoticeLevel::Success,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            level: NoticeLevel::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            level: NoticeLevel::Error,
        }
    }

    /// Two-character marker shown where a badge would be.
    pub fn badge(&self) -> &'static str {
        match self.level {
            NoticeLevel::Success | NoticeLevel::Warning => "OK",
            NoticeLevel::Error => "!",
            NoticeLevel::Info => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

pub trait Notifier {
    fn notify(&self, notice: &Notice);
}

pub trait Launcher {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Writes badges to stderr and full messages to the log, per the configured
/// styles.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    styles: Vec<NotificationStyle>,
}

impl ConsoleNotifier {
    pub fn new(styles: Vec<NotificationStyle>) -> Self {
        Self { styles }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: &Notice) {
        if self.styles.contains(&NotificationStyle::Badge) && !notice.badge().is_empty() {
            eprintln!("[{}]", notice.badge());
        }
        if self.styles.contains(&NotificationStyle::Notification) {
            match notice.level {
                NoticeLevel::Error => error!("{}", notice.text),
                NoticeLevel::Warning => warn!("{}", notice.text),
                NoticeLevel::Info | NoticeLevel::Success => info!("{}", notice.text),
            }
        }
    }
}

/// Prints the URL so the user (or a wrapper script) can open it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintLauncher;

impl Launcher for PrintLauncher {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        println!("{url}");
        Ok(())
    }
}
