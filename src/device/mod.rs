pub mod input;
pub mod output;

use crate::board::Board;
use crate::error::{DeckError, Result};
use crate::event::DeckEvent;
use crate::render::Renderer;
use arc_swap::ArcSwapOption;
use elgato_streamdeck::asynchronous::AsyncStreamDeck;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared view of the currently connected deck, if any.
#[derive(Clone, Default)]
pub struct DeviceHandle {
    current: Arc<ArcSwapOption<AsyncStreamDeck>>,
}

impl DeviceHandle {
    fn set(&self, deck: Arc<AsyncStreamDeck>) {
        self.current.store(Some(deck));
    }

    fn clear(&self) {
        self.current.store(None);
    }

    /// Blank every key. Does nothing when no deck is connected, so it is
    /// safe to call repeatedly during shutdown.
    ///
    /// # Errors
    /// Returns `DeckError::Device` if the device rejects the update.
    pub async fn clear_all(&self) -> Result<()> {
        let Some(deck) = self.current.load_full() else {
            debug!("no device connected, nothing to clear");
            return Ok(());
        };
        deck.clear_all_button_images()
            .await
            .map_err(|e| DeckError::Device(e.to_string()))?;
        deck.flush()
            .await
            .map_err(|e| DeckError::Device(e.to_string()))
    }
}

/// Manages discovery, connection, and reconnection of a Stream Deck device.
pub struct DeviceManager {
    tx: broadcast::Sender<DeckEvent>,
    cancel: CancellationToken,
    reconnect_interval: Duration,
    brightness: u8,
    board: Arc<Board>,
    renderer: Arc<Renderer>,
    handle: DeviceHandle,
}

impl DeviceManager {
    pub fn new(
        tx: broadcast::Sender<DeckEvent>,
        cancel: CancellationToken,
        reconnect_interval_ms: u64,
        brightness: u8,
        board: Arc<Board>,
        renderer: Arc<Renderer>,
        handle: DeviceHandle,
    ) -> Self {
        Self {
            tx,
            cancel,
            reconnect_interval: Duration::from_millis(reconnect_interval_ms),
            brightness,
            board,
            renderer,
            handle,
        }
    }

    /// Run the device manager loop: discover -> connect -> render/read -> reconnect on disconnect.
    pub async fn run(self) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            match self.discover_and_connect().await {
                Ok(deck) => {
                    info!("Stream Deck connected");
                    self.serve(deck).await;
                }
                Err(e) => {
                    warn!("no device found: {e}");
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(self.reconnect_interval) => {}
            }
        }
    }

    /// Drive one connection until it drops or we shut down.
    async fn serve(&self, deck: Arc<AsyncStreamDeck>) {
        if let Err(e) = deck.set_brightness(self.brightness).await {
            warn!("failed to set brightness: {e}");
        }

        self.handle.set(Arc::clone(&deck));
        let connection = self.cancel.child_token();
        let render = tokio::spawn(output::render_loop(
            Arc::clone(&deck),
            self.tx.subscribe(),
            Arc::clone(&self.board),
            Arc::clone(&self.renderer),
            connection.clone(),
        ));
        let _ = self.tx.send(DeckEvent::DeviceConnected);

        if let Err(e) = input::read_input_loop(deck, self.tx.clone(), connection.clone()).await {
            warn!("device disconnected: {e}");
            let _ = self.tx.send(DeckEvent::DeviceDisconnected);
        }

        connection.cancel();
        let _ = render.await;
        // On shutdown the daemon still needs the handle to blank the keys.
        if !self.cancel.is_cancelled() {
            self.handle.clear();
        }
    }

    async fn discover_and_connect(&self) -> Result<Arc<AsyncStreamDeck>> {
        let hid = elgato_streamdeck::new_hidapi().map_err(|e| DeckError::Hid(e.to_string()))?;

        let devices = elgato_streamdeck::list_devices(&hid);
        let Some((kind, serial)) = devices.first() else {
            return Err(DeckError::NoDevice);
        };
        info!("found Stream Deck {:?} (serial: {})", kind, serial);

        let deck = AsyncStreamDeck::connect(&hid, *kind, serial)
            .map_err(|e| DeckError::Device(e.to_string()))?;

        Ok(Arc::new(deck))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clearing_without_device_is_a_no_op() {
        let handle = DeviceHandle::default();
        handle.clear_all().await.unwrap();
        handle.clear_all().await.unwrap();
    }
}
