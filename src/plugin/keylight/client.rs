//! Elgato Key Light HTTP API.
//!
//! A light serves its state at `http://<host>:9123/elgato/lights`; `PUT`ting
//! the same document back applies it.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MIN_BRIGHTNESS: u8 = 3;
pub const MAX_BRIGHTNESS: u8 = 100;

/// Color temperature in the light's own units (mireds): 143 is 7000 K,
/// 344 is 2900 K.
pub const MIN_TEMPERATURE: u16 = 143;
pub const MAX_TEMPERATURE: u16 = 344;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightGroup {
    pub number_of_lights: u32,
    pub lights: Vec<LightState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    pub on: u8,
    pub brightness: u8,
    pub temperature: u16,
}

/// A change applied to every light in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightAdjust {
    TogglePower,
    Brightness(i16),
    Temperature(i16),
}

impl LightAdjust {
    pub fn apply(self, light: &mut LightState) {
        match self {
            Self::TogglePower => light.on = u8::from(light.on == 0),
            Self::Brightness(delta) => {
                let value = (i16::from(light.brightness) + delta)
                    .clamp(i16::from(MIN_BRIGHTNESS), i16::from(MAX_BRIGHTNESS));
                light.brightness = u8::try_from(value).unwrap_or(MAX_BRIGHTNESS);
            }
            Self::Temperature(delta) => {
                let value = (i32::from(light.temperature) + i32::from(delta))
                    .clamp(i32::from(MIN_TEMPERATURE), i32::from(MAX_TEMPERATURE));
                light.temperature = u16::try_from(value).unwrap_or(MAX_TEMPERATURE);
            }
        }
    }
}

impl std::fmt::Display for LightAdjust {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TogglePower => write!(f, "toggle power"),
            Self::Brightness(delta) => write!(f, "brightness {delta:+}"),
            Self::Temperature(delta) => write!(f, "temperature {delta:+}"),
        }
    }
}

/// One light (or light group) reachable over HTTP.
#[derive(Debug, Clone)]
pub struct KeyLight {
    url: String,
    http: reqwest::Client,
}

impl KeyLight {
    pub fn new(http: reqwest::Client, host: &str, port: u16) -> Self {
        Self {
            url: format!("http://{host}:{port}/elgato/lights"),
            http,
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// # Errors
    /// Fails if the light is unreachable or answers with an error status.
    pub async fn fetch_group(&self) -> Result<LightGroup> {
        let resp = self.http.get(&self.url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    /// # Errors
    /// Fails if the light is unreachable or rejects the update.
    pub async fn update_group(&self, group: &LightGroup) -> Result<LightGroup> {
        let resp = self
            .http
            .put(&self.url)
            .json(group)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    /// Fetch, adjust every light, write back.
    ///
    /// # Errors
    /// Fails if either request fails.
    pub async fn adjust(&self, adjust: LightAdjust) -> Result<LightGroup> {
        let mut group = self.fetch_group().await?;
        for light in &mut group.lights {
            adjust.apply(light);
        }
        debug!(url = %self.url, "setting {group:?}");
        self.update_group(&group).await
    }
}
