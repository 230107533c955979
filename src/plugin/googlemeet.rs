//! Keystrokes into Google Meet browser windows, sent with `xdotool`.

use super::{probe_timeout, Plugin};
use crate::action::ExecAction;
use crate::button::{Appearance, DeckButton};
use crate::config::schema::GoogleMeetConfig;
use crate::group::WidgetGroup;
use crate::liveness::LivenessPoller;
use std::sync::Arc;
use std::time::Duration;

/// Meet call windows are titled "Meet - xxx-xxx-xxx". The title survives
/// leaving the call, but the "Google Meet" landing page does not match.
const WINDOW_PATTERN: &str = "Meet - *";

const XDOTOOL: &str = "xdotool";

const MUTE_KEYS: &str = "ctrl+d";
const VIDEO_KEYS: &str = "ctrl+e";
const RAISE_HAND_KEYS: &str = "ctrl+alt+h";

pub struct GoogleMeetPlugin {
    buttons: Vec<Arc<DeckButton>>,
    poller: Option<LivenessPoller>,
}

impl GoogleMeetPlugin {
    pub fn new(config: &GoogleMeetConfig, poll_interval: Duration) -> Self {
        let window_command = if config.switch_to_window {
            "windowactivate"
        } else {
            "windowfocus"
        };

        let buttons: Vec<Arc<DeckButton>> = [
            (config.video_key, "Camera", VIDEO_KEYS),
            (config.mute_key, "Mic", MUTE_KEYS),
            (config.raise_hand_key, "Hand", RAISE_HAND_KEYS),
        ]
        .into_iter()
        .filter_map(|(key, label, keys)| {
            let key = key?;
            let action = keystroke(window_command, keys);
            Some(Arc::new(DeckButton::with_action(
                key,
                Appearance::labeled(label),
                Arc::new(action),
            )))
        })
        .collect();

        let poller = config.track_window.then(|| {
            let mut group = WidgetGroup::new("googlemeet");
            for button in &buttons {
                group.register(button.clone());
            }
            let search = ExecAction::new(XDOTOOL, ["search", "--name", WINDOW_PATTERN])
                .with_timeout(probe_timeout(poll_interval));
            group.watch(poll_interval, move || {
                let search = search.clone();
                // xdotool exits non-zero when no window matches.
                async move { search.run().await.is_ok() }
            })
        });

        Self { buttons, poller }
    }
}

/// Find the Meet window, bring it forward and send it `keys`.
fn keystroke(window_command: &str, keys: &str) -> ExecAction {
    ExecAction::new(
        XDOTOOL,
        ["search", "--name", WINDOW_PATTERN, window_command, "key", keys],
    )
}

impl Plugin for GoogleMeetPlugin {
    fn name(&self) -> &'static str {
        "googlemeet"
    }

    fn buttons(&self) -> &[Arc<DeckButton>] {
        &self.buttons
    }

    fn close(&self) {
        if let Some(poller) = &self.poller {
            poller.stop();
        }
    }
}
