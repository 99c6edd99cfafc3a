//! User-facing notifications emitted by exports.

use std::fmt;
use std::sync::Mutex;

/// Severity of a notification, mirroring a toast UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
        };
        f.write_str(s)
    }
}

/// Notification capability injected into the exporter.
pub trait Notifier {
    fn notify(&self, message: &str, kind: NotificationKind);
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn notify(&self, message: &str, kind: NotificationKind) {
        (**self).notify(message, kind)
    }
}

/// Routes notifications to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, kind: NotificationKind) {
        match kind {
            NotificationKind::Error => log::error!("{message}"),
            NotificationKind::Info | NotificationKind::Success => log::info!("{message}"),
        }
    }
}

/// Keeps every notification in order; used by tests and embedders that
/// display notifications after the fact.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<(String, NotificationKind)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, NotificationKind)> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(_, k)| *k == kind)
            .map(|(m, _)| m)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NotificationKind) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push((message.to_string(), kind));
    }
}
