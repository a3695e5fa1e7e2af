#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/// User-visible toast surface. Fire and forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str);
}

/// Routes notifications to the log, used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
        match kind {
            NotificationKind::Success | NotificationKind::Info => {
                log::info!("{title}: {message}")
            }
            NotificationKind::Error => log::error!("{title}: {message}"),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::{NotificationKind, NotificationSink};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Notification {
        pub kind: NotificationKind,
        pub title: String,
        pub message: String,
    }

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        seen: Mutex<Vec<Notification>>,
    }

    impl RecordingSink {
        pub fn all(&self) -> Vec<Notification> {
            self.seen.lock().unwrap().clone()
        }

        pub fn count(&self, kind: NotificationKind) -> usize {
            self.all().iter().filter(|n| n.kind == kind).count()
        }
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
            self.seen.lock().unwrap().push(Notification {
                kind,
                title: title.to_string(),
                message: message.to_string(),
            });
        }
    }
}
