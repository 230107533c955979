use crate::error::{DeckError, Result};
use crate::event::DeckEvent;
use elgato_streamdeck::asynchronous::AsyncStreamDeck;
use elgato_streamdeck::StreamDeckInput;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Read button events from the Stream Deck, forwarding edges to the broadcast channel.
pub async fn read_input_loop(
    deck: Arc<AsyncStreamDeck>,
    tx: broadcast::Sender<DeckEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut held: Vec<bool> = Vec::new();

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        // read_input uses block_in_place internally, poll at 60Hz.
        let input = deck
            .read_input(60.0)
            .await
            .map_err(|e| DeckError::Hid(e.to_string()))?;

        match input {
            StreamDeckInput::ButtonStateChange(buttons) => {
                for event in edges(&mut held, &buttons) {
                    debug!("{event:?}");
                    let _ = tx.send(event);
                }
            }
            StreamDeckInput::NoData => {}
            _ => {
                // Encoders and touch strips are not bound to anything.
            }
        }
    }
}

/// Compare a full key-state report against the previous one and return the
/// press/release events it implies.
fn edges(held: &mut Vec<bool>, now: &[bool]) -> Vec<DeckEvent> {
    held.resize(now.len(), false);
    let mut events = Vec::new();
    for (idx, (was, &is)) in held.iter_mut().zip(now).enumerate() {
        if *was == is {
            continue;
        }
        *was = is;
        let key = idx as u8;
        events.push(if is {
            DeckEvent::ButtonDown(key)
        } else {
            DeckEvent::ButtonUp(key)
        });
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transitions_are_reported() {
        let mut held = Vec::new();
        assert_eq!(
            edges(&mut held, &[true, false, false]),
            vec![DeckEvent::ButtonDown(0)]
        );
        // Key 0 still held while key 2 goes down.
        assert_eq!(
            edges(&mut held, &[true, false, true]),
            vec![DeckEvent::ButtonDown(2)]
        );
        assert_eq!(
            edges(&mut held, &[false, false, false]),
            vec![DeckEvent::ButtonUp(0), DeckEvent::ButtonUp(2)]
        );
        assert!(edges(&mut held, &[false, false, false]).is_empty());
    }
}
