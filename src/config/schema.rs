use serde::Deserialize;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub deckplug: DeckplugConfig,

    /// Google Meet keystroke buttons. Absent section disables the plugin.
    #[serde(default)]
    pub googlemeet: Option<GoogleMeetConfig>,

    /// OBS Studio scene buttons.
    #[serde(default)]
    pub obs: Option<ObsConfig>,

    /// Elgato Key Light buttons.
    #[serde(default)]
    pub keylight: Option<KeylightConfig>,

    /// Free-standing command buttons.
    #[serde(default)]
    pub buttons: Vec<ExecButtonConfig>,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeckplugConfig {
    /// Display brightness 0-100.
    #[serde(default = "default_brightness")]
    pub brightness: u8,

    /// Milliseconds between device reconnect attempts.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Milliseconds between liveness probes of external resources.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// TTF/OTF font used for button labels. Labels are skipped without one.
    #[serde(default)]
    pub font: Option<String>,

    /// Default style for buttons.
    #[serde(default)]
    pub defaults: ButtonDefaults,
}

impl Default for DeckplugConfig {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            reconnect_interval_ms: default_reconnect_interval(),
            poll_interval_ms: default_poll_interval(),
            log_level: default_log_level(),
            font: None,
            defaults: ButtonDefaults::default(),
        }
    }
}

/// Default styling applied to all buttons unless overridden.
#[derive(Debug, Clone, Deserialize)]
pub struct ButtonDefaults {
    /// Hex color, e.g. "#1a1a2e".
    #[serde(default = "default_background")]
    pub background: String,

    /// Hex color for text.
    #[serde(default = "default_text_color")]
    pub text_color: String,

    /// Font size in pixels.
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

impl Default for ButtonDefaults {
    fn default() -> Self {
        Self {
            background: default_background(),
            text_color: default_text_color(),
            font_size: default_font_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleMeetConfig {
    /// Raise the Meet window (`windowactivate`) instead of only focusing it.
    #[serde(default)]
    pub switch_to_window: bool,

    /// Disable the buttons while no Meet window exists.
    #[serde(default)]
    pub track_window: bool,

    #[serde(default = "default_meet_mute_key")]
    pub mute_key: Option<u8>,

    #[serde(default = "default_meet_video_key")]
    pub video_key: Option<u8>,

    #[serde(default = "default_meet_raise_hand_key")]
    pub raise_hand_key: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObsConfig {
    #[serde(default = "default_obs_host")]
    pub host: String,

    #[serde(default = "default_obs_port")]
    pub port: u16,

    #[serde(default)]
    pub password: Option<String>,

    /// Key for a button that starts OBS with the virtual camera.
    #[serde(default)]
    pub launch_key: Option<u8>,

    #[serde(default)]
    pub scenes: Vec<SceneButtonConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneButtonConfig {
    pub key: u8,

    /// Scene to switch to.
    pub scene: String,

    /// Label override; defaults to the scene name.
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub background: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeylightConfig {
    /// Addresses that may host a Key Light. Empty means mDNS discovery.
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default = "default_keylight_port")]
    pub port: u16,

    /// How long one discovery round may take.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_ms: u64,

    /// Brightness change per press, in percent.
    #[serde(default = "default_brightness_step")]
    pub brightness_step: u8,

    /// Color temperature change per press, in device units.
    #[serde(default = "default_temperature_step")]
    pub temperature_step: u8,

    #[serde(default)]
    pub power_key: Option<u8>,

    #[serde(default)]
    pub brighter_key: Option<u8>,

    #[serde(default)]
    pub dimmer_key: Option<u8>,

    #[serde(default)]
    pub warmer_key: Option<u8>,

    #[serde(default)]
    pub cooler_key: Option<u8>,
}

/// A button that runs a command.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecButtonConfig {
    pub key: u8,

    #[serde(default)]
    pub label: Option<String>,

    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub background: Option<String>,

    #[serde(default)]
    pub text_color: Option<String>,
}

// --- Defaults ---

fn default_brightness() -> u8 {
    80
}

fn default_reconnect_interval() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_background() -> String {
    "#1a1a2e".to_string()
}

fn default_text_color() -> String {
    "#e0e0e0".to_string()
}

fn default_font_size() -> f32 {
    14.0
}

#[allow(clippy::unnecessary_wraps)]
fn default_meet_mute_key() -> Option<u8> {
    Some(5)
}

#[allow(clippy::unnecessary_wraps)]
fn default_meet_video_key() -> Option<u8> {
    Some(0)
}

#[allow(clippy::unnecessary_wraps)]
fn default_meet_raise_hand_key() -> Option<u8> {
    Some(10)
}

fn default_obs_host() -> String {
    "localhost".to_string()
}

fn default_obs_port() -> u16 {
    4455
}

fn default_keylight_port() -> u16 {
    9123
}

fn default_discovery_timeout() -> u64 {
    4000
}

fn default_brightness_step() -> u8 {
    10
}

fn default_temperature_step() -> u8 {
    10
}
