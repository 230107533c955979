use crate::board::Board;
use crate::button::Button;
use crate::error::{DeckError, Result};
use crate::event::DeckEvent;
use crate::render::Renderer;
use elgato_streamdeck::asynchronous::AsyncStreamDeck;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Keep the keys in sync with the board while a device is connected.
///
/// Subscribed before `DeviceConnected` is sent, so the daemon's `RenderAll`
/// in reply draws the first frame.
pub async fn render_loop(
    deck: Arc<AsyncStreamDeck>,
    mut rx: broadcast::Receiver<DeckEvent>,
    board: Arc<Board>,
    renderer: Arc<Renderer>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => return,
            event = rx.recv() => event,
        };

        let result = match event {
            Ok(DeckEvent::RenderButton(key)) => render_key(&deck, &board, &renderer, key).await,
            Ok(DeckEvent::RenderAll) => render_all(&deck, &board, &renderer).await,
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!("render loop lagged by {n} events, redrawing everything");
                render_all(&deck, &board, &renderer).await
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        if let Err(e) = result {
            warn!("render failed: {e}");
        }
    }
}

async fn render_key(
    deck: &AsyncStreamDeck,
    board: &Board,
    renderer: &Renderer,
    key: u8,
) -> Result<()> {
    if key >= deck.kind().key_count() {
        return Ok(());
    }
    let Some(button) = board.button(key) else {
        return Ok(());
    };

    let image = renderer.render(button)?;
    deck.set_button_image(key, image)
        .await
        .map_err(|e| DeckError::Device(e.to_string()))?;
    deck.flush()
        .await
        .map_err(|e| DeckError::Device(e.to_string()))
}

async fn render_all(deck: &AsyncStreamDeck, board: &Board, renderer: &Renderer) -> Result<()> {
    let key_count = deck.kind().key_count();
    deck.clear_all_button_images()
        .await
        .map_err(|e| DeckError::Device(e.to_string()))?;

    for button in board.buttons() {
        let key = button.index();
        if key >= key_count {
            warn!(key, "button does not fit on this device ({key_count} keys)");
            continue;
        }
        let image = renderer.render(button)?;
        deck.set_button_image(key, image)
            .await
            .map_err(|e| DeckError::Device(e.to_string()))?;
    }

    deck.flush()
        .await
        .map_err(|e| DeckError::Device(e.to_string()))
}
