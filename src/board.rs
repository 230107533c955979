use crate::button::{Button, DeckButton};
use crate::event::DeckEvent;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Which button sits on which key.
///
/// Filled during setup, then shared read-only.
pub struct Board {
    buttons: BTreeMap<u8, Arc<DeckButton>>,
    tx: broadcast::Sender<DeckEvent>,
}

impl Board {
    pub fn new(tx: broadcast::Sender<DeckEvent>) -> Self {
        Self {
            buttons: BTreeMap::new(),
            tx,
        }
    }

    /// Place a button on its key. A button already on that key is replaced.
    pub fn add_button(&mut self, button: Arc<DeckButton>) {
        let key = button.index();
        button.attach_updates(self.tx.clone());
        if let Some(old) = self.buttons.insert(key, button) {
            warn!(
                key,
                "key assigned twice, replacing {:?}",
                old.appearance().label.as_deref().unwrap_or("unlabeled button")
            );
        }
    }

    #[must_use]
    pub fn button(&self, key: u8) -> Option<&Arc<DeckButton>> {
        self.buttons.get(&key)
    }

    /// All placed buttons, ordered by key.
    pub fn buttons(&self) -> impl Iterator<Item = &Arc<DeckButton>> {
        self.buttons.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}
