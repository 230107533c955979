use crate::action::ActionHandler;
use crate::event::DeckEvent;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

/// Capability surface of a key on the deck.
///
/// Setting the active flag may happen from a poller task while presses are
/// handled on the event loop, so implementations must be `Sync`.
pub trait Button: Send + Sync {
    /// Key index on the device.
    fn index(&self) -> u8;

    fn is_active(&self) -> bool;

    fn set_active(&self, active: bool);

    /// Bind the handler run on press. Replaces any previous handler.
    fn set_action_handler(&self, handler: Arc<dyn ActionHandler>);

    fn action_handler(&self) -> Option<Arc<dyn ActionHandler>>;
}

/// What a button shows. Colors fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Appearance {
    pub label: Option<String>,
    pub background: Option<String>,
    pub text_color: Option<String>,
}

impl Appearance {
    #[must_use]
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }
}

/// A button on the physical deck.
///
/// Starts active. Active-flag changes are announced as
/// `DeckEvent::RenderButton` once the button has been placed on a board.
pub struct DeckButton {
    index: u8,
    appearance: Appearance,
    active: AtomicBool,
    action: Mutex<Option<Arc<dyn ActionHandler>>>,
    updates: OnceLock<broadcast::Sender<DeckEvent>>,
}

impl DeckButton {
    #[must_use]
    pub fn new(index: u8, appearance: Appearance) -> Self {
        Self {
            index,
            appearance,
            active: AtomicBool::new(true),
            action: Mutex::new(None),
            updates: OnceLock::new(),
        }
    }

    /// Convenience for `new` followed by `set_action_handler`.
    #[must_use]
    pub fn with_action(index: u8, appearance: Appearance, handler: Arc<dyn ActionHandler>) -> Self {
        let button = Self::new(index, appearance);
        button.set_action_handler(handler);
        button
    }

    #[must_use]
    pub const fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    /// Attach the channel used to request re-renders. Only the first call
    /// has any effect.
    pub(crate) fn attach_updates(&self, tx: broadcast::Sender<DeckEvent>) {
        let _ = self.updates.set(tx);
    }
}

impl Button for DeckButton {
    fn index(&self) -> u8 {
        self.index
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn set_active(&self, active: bool) {
        let previous = self.active.swap(active, Ordering::AcqRel);
        if previous != active {
            debug!(key = self.index, active, "button state changed");
            if let Some(tx) = self.updates.get() {
                let _ = tx.send(DeckEvent::RenderButton(self.index));
            }
        }
    }

    fn set_action_handler(&self, handler: Arc<dyn ActionHandler>) {
        *self.action.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn action_handler(&self) -> Option<Arc<dyn ActionHandler>> {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for DeckButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeckButton")
            .field("index", &self.index)
            .field("label", &self.appearance.label)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
