use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

/// A message the user gets to see, toast style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

/// Sends notices to whoever renders them and mirrors each one to the log.
///
/// A notifier whose receiver is gone keeps logging.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn channel() -> (Notifier, UnboundedReceiver<Notice>) {
        let (tx, rx) = unbounded_channel();
        (Notifier { tx: Some(tx) }, rx)
    }

    /// Log-only notifier.
    pub fn log_only() -> Notifier {
        Notifier { tx: None }
    }

    pub fn success<S: Into<String>>(&self, message: S) {
        let message = message.into();
        log::info!("{}", message);
        self.send(Level::Success, message);
    }

    pub fn error<S: Into<String>>(&self, message: S) {
        let message = message.into();
        log::warn!("{}", message);
        self.send(Level::Error, message);
    }

    fn send(&self, level: Level, message: String) {
        if let Some(tx) = &self.tx {
            // a closed receiver only means nobody is watching anymore
            let _ = tx.send(Notice { level, message });
        }
    }
}

/// Everything queued on `rx` so far.
pub fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}
