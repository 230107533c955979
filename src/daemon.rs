use crate::action::{self, PressOutcome};
use crate::board::Board;
use crate::button::DeckButton;
use crate::config::schema::AppConfig;
use crate::device::{DeviceHandle, DeviceManager};
use crate::error::Result;
use crate::event::DeckEvent;
use crate::plugin::{self, Plugin};
use crate::render::Renderer;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const CHANNEL_CAPACITY: usize = 64;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Presses that may wait on one key while its action runs. Further
/// presses are dropped.
const PRESS_BACKLOG: usize = 4;

/// Run the deckplug daemon until SIGINT/SIGTERM.
///
/// # Errors
/// Returns `DeckError` if setup fails (bad font, plugin construction).
pub async fn run(config: AppConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let (tx, _) = broadcast::channel::<DeckEvent>(CHANNEL_CAPACITY);

    let renderer = Arc::new(Renderer::new(
        config.deckplug.defaults.clone(),
        config.deckplug.font.as_deref().map(Path::new),
    )?);
    if !renderer.has_font() {
        info!("no font configured, buttons are drawn without labels");
    }

    let mut board = Board::new(tx.clone());
    let plugins = plugin::assemble(&config, &mut board)?;
    let board = Arc::new(board);
    info!("{} plugins, {} buttons", plugins.len(), board.len());

    let device = DeviceHandle::default();
    let device_task = spawn_device_manager(&config, &tx, &cancel, &board, &renderer, &device);

    let mut rx = tx.subscribe();
    let mut presses = PressQueues::default();
    info!("deckplug daemon running");

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            () = shutdown_signal() => break,
            event = rx.recv() => {
                match event {
                    Ok(e) => e,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("event loop lagged, missed {n} events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };

        handle_event(event, &board, &tx, &mut presses);
    }

    info!("daemon shutting down...");
    shutdown(&plugins, &device).await;
    cancel.cancel();

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, device_task).await.is_err() {
        warn!("device manager did not stop within {SHUTDOWN_TIMEOUT:?}");
    }

    info!("daemon stopped");
    Ok(())
}

fn spawn_device_manager(
    config: &AppConfig,
    tx: &broadcast::Sender<DeckEvent>,
    cancel: &CancellationToken,
    board: &Arc<Board>,
    renderer: &Arc<Renderer>,
    device: &DeviceHandle,
) -> JoinHandle<()> {
    let dm = DeviceManager::new(
        tx.clone(),
        cancel.clone(),
        config.deckplug.reconnect_interval_ms,
        config.deckplug.brightness,
        Arc::clone(board),
        Arc::clone(renderer),
        device.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = dm.run().await {
            error!("device manager error: {e}");
        }
    })
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}

/// Stop every plugin's background work, then blank the keys.
async fn shutdown(plugins: &[Box<dyn Plugin>], device: &DeviceHandle) {
    for plugin in plugins {
        debug!(plugin = plugin.name(), "closing");
        plugin.close();
    }
    if let Err(e) = device.clear_all().await {
        warn!("failed to clear buttons: {e}");
    }
}

/// One worker task per key. Presses on the same key run in order, so a
/// double-tap on a toggle applies twice; different keys run side by side.
#[derive(Default)]
struct PressQueues {
    workers: HashMap<u8, mpsc::Sender<()>>,
}

impl PressQueues {
    fn press(&mut self, key: u8, button: &Arc<DeckButton>) {
        let worker = self
            .workers
            .entry(key)
            .or_insert_with(|| spawn_press_worker(key, Arc::clone(button)));

        match worker.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => warn!(key, "key busy, press dropped"),
            Err(TrySendError::Closed(())) => {
                debug!(key, "press worker gone, restarting");
                *worker = spawn_press_worker(key, Arc::clone(button));
                let _ = worker.try_send(());
            }
        }
    }
}

fn spawn_press_worker(key: u8, button: Arc<DeckButton>) -> mpsc::Sender<()> {
    let (tx, mut rx) = mpsc::channel(PRESS_BACKLOG);
    tokio::spawn(async move {
        while rx.recv().await.is_some() {
            if action::press(button.as_ref()).await == PressOutcome::Completed {
                debug!(key, "action completed");
            }
        }
    });
    tx
}

/// Handle a single event.
fn handle_event(
    event: DeckEvent,
    board: &Board,
    tx: &broadcast::Sender<DeckEvent>,
    presses: &mut PressQueues,
) {
    match event {
        DeckEvent::ButtonDown(key) => match board.button(key) {
            Some(button) => presses.press(key, button),
            None => debug!(key, "no button on key"),
        },

        DeckEvent::ButtonUp(_) | DeckEvent::RenderAll | DeckEvent::RenderButton(_) => {}

        DeckEvent::DeviceConnected => {
            info!("device connected");
            let _ = tx.send(DeckEvent::RenderAll);
        }

        DeckEvent::DeviceDisconnected => {
            info!("device disconnected, waiting for reconnect...");
        }
    }
}
