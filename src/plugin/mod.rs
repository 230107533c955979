//! Integrations that put buttons on the board.
//!
//! A plugin builds its buttons during setup, hands them to the board, and
//! may run a liveness poller that enables and disables them.

pub mod exec;
pub mod googlemeet;
pub mod keylight;
pub mod obs;

use crate::board::Board;
use crate::button::DeckButton;
use crate::config::schema::AppConfig;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn buttons(&self) -> &[Arc<DeckButton>];

    /// Stop background work. Safe to call more than once.
    fn close(&self);
}

/// Upper bound for a single liveness probe: never longer than the poll
/// interval, but long enough for a local round trip.
#[must_use]
pub fn probe_timeout(interval: Duration) -> Duration {
    interval.clamp(Duration::from_millis(500), Duration::from_secs(5))
}

/// Build every configured plugin and place its buttons on the board.
///
/// Plugins are added in a fixed order (meet, obs, keylight, command buttons);
/// if two claim the same key the later one wins.
///
/// # Errors
/// Returns an error if a plugin cannot be set up.
pub fn assemble(config: &AppConfig, board: &mut Board) -> Result<Vec<Box<dyn Plugin>>> {
    let poll_interval = Duration::from_millis(config.deckplug.poll_interval_ms);
    let mut plugins: Vec<Box<dyn Plugin>> = Vec::new();

    if let Some(meet) = &config.googlemeet {
        plugins.push(Box::new(googlemeet::GoogleMeetPlugin::new(meet, poll_interval)));
    }
    if let Some(obs) = &config.obs {
        plugins.push(Box::new(obs::ObsPlugin::new(obs, poll_interval)));
    }
    if let Some(kl) = &config.keylight {
        plugins.push(Box::new(keylight::KeylightPlugin::new(kl, poll_interval)?));
    }
    if !config.buttons.is_empty() {
        plugins.push(Box::new(exec::ExecButtons::new(&config.buttons)));
    }

    for plugin in &plugins {
        info!(
            plugin = plugin.name(),
            "placing {} buttons",
            plugin.buttons().len()
        );
        for button in plugin.buttons() {
            board.add_button(Arc::clone(button));
        }
    }

    Ok(plugins)
}
