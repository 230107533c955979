pub mod schema;

use crate::error::{DeckError, Result};
use schema::AppConfig;
use std::path::Path;

/// Highest key index on any supported deck (XL has 32 keys).
pub const MAX_KEY: u8 = 31;

/// Load and parse configuration from a TOML file.
///
/// # Errors
/// Returns `DeckError::ConfigNotFound` if the file doesn't exist,
/// `DeckError::Io` on read errors, `DeckError::TomlParse` on syntax errors,
/// or `DeckError::Config` on validation failures.
pub fn load(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(DeckError::ConfigNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Parse configuration text, expanding environment variables first.
///
/// # Errors
/// Same as [`load`], minus the file errors.
pub fn parse(content: &str) -> Result<AppConfig> {
    let content = expand_env_vars(content);
    let config: AppConfig = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Expand `${VAR}` and `$VAR` patterns. Unknown variables are left as is.
fn expand_env_vars(input: &str) -> String {
    use std::fmt::Write;

    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        if chars.peek() == Some(&'{') {
            chars.next();
            let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
            match std::env::var(&name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    let _ = write!(result, "${{{name}}}");
                }
            }
            continue;
        }

        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        match std::env::var(&name) {
            Ok(val) if !name.is_empty() => result.push_str(&val),
            _ => {
                result.push('$');
                result.push_str(&name);
            }
        }
    }

    result
}

fn check_key(what: &str, key: u8) -> Result<()> {
    if key > MAX_KEY {
        return Err(DeckError::Config(format!(
            "{what}: key {key} out of range (0-{MAX_KEY})"
        )));
    }
    Ok(())
}

fn check_step(what: &str, step: u8) -> Result<()> {
    if step == 0 || step > 100 {
        return Err(DeckError::Config(format!("{what} must be 1-100")));
    }
    Ok(())
}

/// Validate config constraints.
fn validate(config: &AppConfig) -> Result<()> {
    if config.deckplug.brightness > 100 {
        return Err(DeckError::Config(
            "deckplug.brightness must be 0-100".to_string(),
        ));
    }

    if config.deckplug.poll_interval_ms == 0 {
        return Err(DeckError::Config(
            "deckplug.poll_interval_ms must be at least 1".to_string(),
        ));
    }

    if let Some(meet) = &config.googlemeet {
        for (what, key) in [
            ("googlemeet.mute_key", meet.mute_key),
            ("googlemeet.video_key", meet.video_key),
            ("googlemeet.raise_hand_key", meet.raise_hand_key),
        ] {
            if let Some(key) = key {
                check_key(what, key)?;
            }
        }
    }

    if let Some(obs) = &config.obs {
        if obs.port == 0 {
            return Err(DeckError::Config("obs.port must not be 0".to_string()));
        }
        if let Some(key) = obs.launch_key {
            check_key("obs.launch_key", key)?;
        }
        for scene in &obs.scenes {
            check_key("obs.scenes", scene.key)?;
            if scene.scene.trim().is_empty() {
                return Err(DeckError::Config(format!(
                    "obs.scenes: key {} has an empty scene name",
                    scene.key
                )));
            }
        }
    }

    if let Some(kl) = &config.keylight {
        check_step("keylight.brightness_step", kl.brightness_step)?;
        check_step("keylight.temperature_step", kl.temperature_step)?;
        for (what, key) in [
            ("keylight.power_key", kl.power_key),
            ("keylight.brighter_key", kl.brighter_key),
            ("keylight.dimmer_key", kl.dimmer_key),
            ("keylight.warmer_key", kl.warmer_key),
            ("keylight.cooler_key", kl.cooler_key),
        ] {
            if let Some(key) = key {
                check_key(what, key)?;
            }
        }
    }

    for button in &config.buttons {
        check_key("buttons", button.key)?;
        if button.command.trim().is_empty() {
            return Err(DeckError::Config(format!(
                "buttons: key {} has an empty command",
                button.key
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_error(text: &str) -> String {
        match parse(text) {
            Err(DeckError::Config(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn env_var_expansion() {
        std::env::set_var("DECKPLUG_TEST_VAR", "hello");
        let result = expand_env_vars("password = \"${DECKPLUG_TEST_VAR}\" # $DECKPLUG_TEST_VAR!");
        assert_eq!(result, "password = \"hello\" # hello!");
        std::env::remove_var("DECKPLUG_TEST_VAR");
    }

    #[test]
    fn env_var_missing_kept() {
        let result = expand_env_vars("url = \"${DECKPLUG_NONEXISTENT}/path\" $ $DECKPLUG_NOPE");
        assert_eq!(result, "url = \"${DECKPLUG_NONEXISTENT}/path\" $ $DECKPLUG_NOPE");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load(Path::new("/nonexistent/deckplug.toml")).unwrap_err();
        assert!(matches!(err, DeckError::ConfigNotFound(_)));
    }

    #[test]
    fn rejects_out_of_range_key() {
        let msg = config_error("[[buttons]]\nkey = 40\ncommand = \"true\"\n");
        assert!(msg.contains("buttons"));
        assert!(msg.contains("40"));
    }

    #[test]
    fn rejects_bad_brightness() {
        let msg = config_error("[deckplug]\nbrightness = 150\n");
        assert!(msg.contains("brightness"));
    }

    #[test]
    fn keylight_without_hosts_browses() {
        let config = parse("[keylight]\npower_key = 1\n").unwrap();
        assert!(config.keylight.unwrap().hosts.is_empty());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let msg = config_error("[deckplug]\npoll_interval_ms = 0\n");
        assert!(msg.contains("poll_interval_ms"));
    }

    #[test]
    fn rejects_zero_step() {
        let msg = config_error("[keylight]\nhosts = [\"a\"]\nbrightness_step = 0\n");
        assert!(msg.contains("brightness_step"));
    }

    #[test]
    fn rejects_empty_scene() {
        let msg = config_error("[obs]\n[[obs.scenes]]\nkey = 1\nscene = \" \"\n");
        assert!(msg.contains("scene"));
    }

    #[test]
    fn load_example_config() {
        let dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
        let path = std::path::PathBuf::from(dir).join("config.example.toml");
        if path.exists() {
            let config = load(&path).unwrap();
            assert!(config.googlemeet.is_some());
        }
    }
}
