pub mod exec;
pub mod request;

pub use exec::ExecAction;
pub use request::{RequestAction, RequestClient};

use crate::button::Button;
use crate::error::Result;
use async_trait::async_trait;
use tracing::{debug, error, warn};

/// Something a button does when pressed.
///
/// Handlers perform a single bounded external call and report failure
/// through the returned error; logging happens in [`press`].
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Human readable form of the call, used in log lines.
    fn describe(&self) -> String;

    async fn invoke(&self) -> Result<()>;
}

/// Result of a single press, mostly of interest to tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// The button was inactive; nothing ran.
    Inactive,
    /// No handler bound.
    Unbound,
    Completed,
    Failed,
}

/// Handle a press on `button`.
///
/// Inactive buttons ignore presses. Otherwise the bound handler runs to
/// completion on the calling task and any failure is logged once. Nothing
/// is retried.
pub async fn press(button: &dyn Button) -> PressOutcome {
    let key = button.index();
    if !button.is_active() {
        debug!(key, "button pressed, but is inactive");
        return PressOutcome::Inactive;
    }

    let Some(handler) = button.action_handler() else {
        debug!(key, "button pressed, no action bound");
        return PressOutcome::Unbound;
    };

    debug!(key, action = %handler.describe(), "running action");
    match handler.invoke().await {
        Ok(()) => PressOutcome::Completed,
        Err(e) if e.is_transient() => {
            warn!(key, action = %handler.describe(), "action failed: {e}");
            PressOutcome::Failed
        }
        Err(e) => {
            error!(key, action = %handler.describe(), "action failed: {e}");
            PressOutcome::Failed
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::button::{Appearance, DeckButton};
    use crate::error::DeckError;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Counts invocations; optionally fails every call.
    #[derive(Default)]
    pub(crate) struct CountingAction {
        pub(crate) calls: AtomicUsize,
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl ActionHandler for CountingAction {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        async fn invoke(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DeckError::NotLive("counter".into()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn inactive_press_skips_handler() {
        let counter = Arc::new(CountingAction::default());
        let b = DeckButton::with_action(2, Appearance::default(), counter.clone());
        b.set_active(false);

        for _ in 0..3 {
            assert_eq!(press(&b).await, PressOutcome::Inactive);
        }
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

        b.set_active(true);
        assert_eq!(press(&b).await, PressOutcome::Completed);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unbound_press_is_harmless() {
        let b = DeckButton::new(1, Appearance::default());
        assert_eq!(press(&b).await, PressOutcome::Unbound);
    }

    #[tokio::test]
    async fn failing_handler_is_reported_not_raised() {
        let counter = Arc::new(CountingAction {
            fail: true,
            ..CountingAction::default()
        });
        let b = DeckButton::with_action(4, Appearance::default(), counter.clone());
        assert_eq!(press(&b).await, PressOutcome::Failed);
        assert_eq!(press(&b).await, PressOutcome::Failed);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_executable_logs_one_error() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let action = ExecAction::new("deckplug-no-such-binary", ["--mute"]);
        let b = DeckButton::with_action(9, Appearance::default(), Arc::new(action));

        assert_eq!(press(&b).await, PressOutcome::Failed);

        let output = logs.contents();
        let errors: Vec<&str> = output.lines().filter(|l| l.contains("ERROR")).collect();
        assert_eq!(errors.len(), 1, "log output: {output}");
        assert!(errors[0].contains("deckplug-no-such-binary --mute"));
    }
}
