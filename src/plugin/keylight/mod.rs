//! Elgato Key Light power, brightness and color temperature buttons.

pub mod client;
pub mod discovery;

pub use client::{KeyLight, LightAdjust, LightGroup, LightState};
pub use discovery::{Discovery, LightBrowser, MdnsBrowser};

use super::Plugin;
use crate::action::ActionHandler;
use crate::button::{Appearance, DeckButton};
use crate::config::schema::KeylightConfig;
use crate::error::{DeckError, Result};
use crate::group::WidgetGroup;
use crate::liveness::LivenessPoller;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Bound on each HTTP call to a light.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// The light found by discovery, if any.
type HeldLight = Arc<ArcSwapOption<KeyLight>>;

/// Applies one adjustment to whichever light is currently held.
pub struct LightAction {
    light: HeldLight,
    adjust: LightAdjust,
}

#[async_trait]
impl ActionHandler for LightAction {
    fn describe(&self) -> String {
        format!("keylight {}", self.adjust)
    }

    async fn invoke(&self) -> Result<()> {
        let light = self
            .light
            .load_full()
            .ok_or_else(|| DeckError::NotLive("Key Light".into()))?;
        let group = light.adjust(self.adjust).await?;
        debug!(url = light.url(), "Key Light now {group:?}");
        Ok(())
    }
}

pub struct KeylightPlugin {
    buttons: Vec<Arc<DeckButton>>,
    poller: LivenessPoller,
}

impl KeylightPlugin {
    /// Ask the configured hosts, or browse mDNS when none are configured.
    ///
    /// # Errors
    /// Fails if the HTTP client or the mDNS daemon cannot be started.
    pub fn new(config: &KeylightConfig, poll_interval: Duration) -> Result<Self> {
        let discovery = if config.hosts.is_empty() {
            Discovery::Browse(Box::new(MdnsBrowser::new()?))
        } else {
            Discovery::Hosts {
                hosts: config.hosts.clone(),
                port: config.port,
            }
        };
        Self::with_discovery(config, poll_interval, discovery)
    }

    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn with_discovery(
        config: &KeylightConfig,
        poll_interval: Duration,
        discovery: Discovery,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let light: HeldLight = Arc::new(ArcSwapOption::empty());

        let brightness = i16::from(config.brightness_step);
        let temperature = i16::from(config.temperature_step);
        let buttons: Vec<Arc<DeckButton>> = [
            (config.power_key, "Light", LightAdjust::TogglePower),
            (config.brighter_key, "Bright +", LightAdjust::Brightness(brightness)),
            (config.dimmer_key, "Bright -", LightAdjust::Brightness(-brightness)),
            (config.warmer_key, "Warmer", LightAdjust::Temperature(temperature)),
            (config.cooler_key, "Cooler", LightAdjust::Temperature(-temperature)),
        ]
        .into_iter()
        .filter_map(|(key, label, adjust)| {
            let action = LightAction {
                light: Arc::clone(&light),
                adjust,
            };
            Some(Arc::new(DeckButton::with_action(
                key?,
                Appearance::labeled(label),
                Arc::new(action),
            )))
        })
        .collect();

        let mut group = WidgetGroup::new("keylight");
        for button in &buttons {
            group.register(button.clone());
        }

        let held = light;
        let discovery = Arc::new(discovery);
        let discovery_timeout = Duration::from_millis(config.discovery_timeout_ms);
        let poller = group.watch(poll_interval, move || {
            let held = Arc::clone(&held);
            let discovery = Arc::clone(&discovery);
            let http = http.clone();
            async move {
                if let Some(current) = held.load_full() {
                    if current.fetch_group().await.is_ok() {
                        return true;
                    }
                    info!(url = current.url(), "lost Key Light");
                    held.store(None);
                }
                match discovery.find(&http, discovery_timeout).await {
                    Some(found) => {
                        info!(url = found.url(), "found Key Light");
                        held.store(Some(Arc::new(found)));
                        true
                    }
                    None => false,
                }
            }
        });

        Ok(Self { buttons, poller })
    }
}

impl Plugin for KeylightPlugin {
    fn name(&self) -> &'static str {
        "keylight"
    }

    fn buttons(&self) -> &[Arc<DeckButton>] {
        &self.buttons
    }

    fn close(&self) {
        self.poller.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::client::tests::{fake_light, group};
    use super::discovery::tests::{local, Announced};
    use super::*;
    use crate::action::{press, PressOutcome};
    use crate::button::Button;

    fn config(port: u16) -> KeylightConfig {
        KeylightConfig {
            hosts: vec!["127.0.0.1".into()],
            port,
            discovery_timeout_ms: 1000,
            brightness_step: 10,
            temperature_step: 10,
            power_key: Some(2),
            brighter_key: Some(7),
            dimmer_key: None,
            warmer_key: None,
            cooler_key: Some(17),
        }
    }

    #[tokio::test]
    async fn action_without_light_is_not_live() {
        let action = LightAction {
            light: Arc::new(ArcSwapOption::empty()),
            adjust: LightAdjust::TogglePower,
        };
        assert_eq!(action.describe(), "keylight toggle power");
        assert!(matches!(action.invoke().await, Err(DeckError::NotLive(_))));
    }

    #[tokio::test]
    async fn buttons_start_disabled() {
        let plugin = KeylightPlugin::new(&config(1), Duration::from_secs(60)).unwrap();
        let keys: Vec<(u8, bool)> = plugin
            .buttons()
            .iter()
            .map(|b| (b.index(), b.is_active()))
            .collect();
        assert_eq!(keys, vec![(2, false), (7, false), (17, false)]);
        plugin.close();
        plugin.close();
    }

    #[tokio::test]
    async fn presses_adjust_discovered_light() {
        let (port, state) = fake_light(group(1, 95, 200)).await;
        let plugin = KeylightPlugin::new(&config(port), Duration::from_millis(20)).unwrap();

        let power = Arc::clone(&plugin.buttons()[0]);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !power.is_active() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Key Light never discovered");

        assert_eq!(press(power.as_ref()).await, PressOutcome::Completed);
        assert_eq!(press(plugin.buttons()[1].as_ref()).await, PressOutcome::Completed);
        assert_eq!(press(plugin.buttons()[2].as_ref()).await, PressOutcome::Completed);
        assert_eq!(*state.lock().unwrap(), group(0, 100, 190));

        plugin.close();
    }

    #[tokio::test]
    async fn browsing_uses_the_announced_light() {
        let (port, state) = fake_light(group(0, 50, 200)).await;
        let mut config = config(1);
        config.hosts.clear();
        let browser = Announced {
            lights: vec![local(port)],
            ..Announced::default()
        };
        let plugin = KeylightPlugin::with_discovery(
            &config,
            Duration::from_millis(20),
            Discovery::Browse(Box::new(browser)),
        )
        .unwrap();

        let power = Arc::clone(&plugin.buttons()[0]);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !power.is_active() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("announced Key Light never used");

        assert_eq!(press(power.as_ref()).await, PressOutcome::Completed);
        assert_eq!(*state.lock().unwrap(), group(1, 50, 200));
        plugin.close();
    }
}
