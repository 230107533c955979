//! OBS Studio scene switching over obs-websocket 5.x.

pub mod client;
pub mod protocol;

pub use client::{ObsClient, ObsRequest};

use super::{probe_timeout, Plugin};
use crate::action::{ExecAction, RequestAction};
use crate::button::{Appearance, DeckButton};
use crate::config::schema::ObsConfig;
use crate::group::WidgetGroup;
use crate::liveness::LivenessPoller;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct ObsPlugin {
    client: Arc<ObsClient>,
    buttons: Vec<Arc<DeckButton>>,
    poller: LivenessPoller,
}

impl ObsPlugin {
    /// Build the scene buttons and start watching the connection. Scene
    /// buttons stay disabled until OBS answers.
    pub fn new(config: &ObsConfig, poll_interval: Duration) -> Self {
        let client = Arc::new(ObsClient::new(
            &config.host,
            config.port,
            config.password.clone(),
            probe_timeout(poll_interval),
        ));

        let mut group = WidgetGroup::new("obs");
        let mut buttons = Vec::new();

        for scene in &config.scenes {
            let appearance = Appearance {
                label: Some(scene.label.clone().unwrap_or_else(|| scene.scene.clone())),
                background: scene.background.clone(),
                text_color: None,
            };
            let action = RequestAction::new(
                Arc::clone(&client),
                ObsRequest::SetCurrentProgramScene {
                    scene: scene.scene.clone(),
                },
            );
            let button = Arc::new(DeckButton::with_action(scene.key, appearance, Arc::new(action)));
            group.register(button.clone());
            buttons.push(button);
        }

        // Launching is only useful while OBS is down, so this one is not managed.
        if let Some(key) = config.launch_key {
            let launch = ExecAction::new("obs", ["--startvirtualcam"]);
            buttons.push(Arc::new(DeckButton::with_action(
                key,
                Appearance::labeled("OBS"),
                Arc::new(launch),
            )));
        }

        let probe_client = Arc::clone(&client);
        let poller = group.watch(poll_interval, move || {
            let client = Arc::clone(&probe_client);
            async move { client.probe().await }
        });

        Self {
            client,
            buttons,
            poller,
        }
    }
}

impl Plugin for ObsPlugin {
    fn name(&self) -> &'static str {
        "obs"
    }

    fn buttons(&self) -> &[Arc<DeckButton>] {
        &self.buttons
    }

    fn close(&self) {
        if !self.poller.stop() {
            return;
        }
        // Send a Close frame instead of just dropping the socket.
        let client = Arc::clone(&self.client);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { client.disconnect().await });
            }
            Err(_) => debug!("no runtime, dropping the OBS connection"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{press, PressOutcome};
    use crate::button::Button;
    use crate::config::schema::SceneButtonConfig;

    fn config(port: u16) -> ObsConfig {
        ObsConfig {
            host: "127.0.0.1".into(),
            port,
            password: None,
            launch_key: Some(14),
            scenes: vec![
                SceneButtonConfig {
                    key: 4,
                    scene: "webcam".into(),
                    label: None,
                    background: None,
                },
                SceneButtonConfig {
                    key: 9,
                    scene: "desk".into(),
                    label: Some("Desk cam".into()),
                    background: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn scenes_disabled_until_connected() {
        let plugin = ObsPlugin::new(&config(1), Duration::from_secs(60));
        let active: Vec<(u8, bool)> = plugin
            .buttons()
            .iter()
            .map(|b| (b.index(), b.is_active()))
            .collect();
        assert_eq!(active, vec![(4, false), (9, false), (14, true)]);
        assert_eq!(
            plugin.buttons()[1].appearance().label.as_deref(),
            Some("Desk cam")
        );

        assert_eq!(press(plugin.buttons()[0].as_ref()).await, PressOutcome::Inactive);
        plugin.close();
        plugin.close();
    }

    #[tokio::test]
    async fn scenes_enable_once_obs_answers() {
        let (port, _server) = client::tests::fake_obs(None).await;
        let plugin = ObsPlugin::new(&config(port), Duration::from_millis(20));

        let scene = Arc::clone(&plugin.buttons()[0]);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !scene.is_active() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("scene button never enabled");

        assert_eq!(press(scene.as_ref()).await, PressOutcome::Completed);
        plugin.close();
    }

    #[tokio::test]
    async fn close_says_goodbye_to_obs() {
        let (port, server) = client::tests::fake_obs(None).await;
        let plugin = ObsPlugin::new(&config(port), Duration::from_millis(20));

        let scene = Arc::clone(&plugin.buttons()[0]);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !scene.is_active() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("scene button never enabled");

        plugin.close();
        plugin.close();

        // The fake server only returns once its client has closed the socket,
        // while the plugin (and its client) are still alive.
        let seen = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("connection was never closed")
            .unwrap();
        assert!(seen.iter().all(|r| r == "GetVersion"));
        drop(plugin);
    }
}
