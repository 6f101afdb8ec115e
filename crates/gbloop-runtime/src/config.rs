//! Session configuration, stored as TOML.
//!
//! ```toml
//! [config]
//! enable_audio = true
//! multi_press_mode = "timeout-simulation"
//!
//! [debug]
//! show_delay_factor = false
//!
//! [key_binding]
//! quit = 27
//! ```
//!
//! Every key is optional.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{audio::AudioFormat, input::KeyBinding, input::MultiPressMode};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid config file: {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, rename = "config")]
    pub options: Options,
    #[serde(default)]
    pub debug: DebugOptions,
    #[serde(default)]
    pub key_binding: KeyBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default = "default_true")]
    pub enable_audio: bool,
    /// Forwarded to the engine; renders every other line per frame.
    #[serde(default)]
    pub interlace: bool,
    /// Forwarded to the engine as frame skip.
    #[serde(default)]
    pub half_refresh: bool,
    /// Write cartridge RAM to disk about once a minute.
    #[serde(default = "default_true")]
    pub sram_auto_commit: bool,
    #[serde(default)]
    pub multi_press_mode: MultiPressMode,
    /// Re-inject wall-clock time into the cartridge RTC after resume.
    #[serde(default)]
    pub sync_rtc_on_resume: bool,
    /// Tick the cartridge RTC once every 60 frames from the frame loop.
    #[serde(default)]
    pub manual_rtc: bool,
    #[serde(default = "default_one")]
    pub button_hold_compensation_num: u16,
    #[serde(default = "default_one")]
    pub button_hold_compensation_denom: u16,
    #[serde(default = "default_ring_chunks")]
    pub audio_ring_chunks: usize,
    #[serde(default = "default_sample_rate")]
    pub audio_sample_rate: u32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate_millihz: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebugOptions {
    /// Averages the frame sleep over 32 frames and draws it on screen.
    #[serde(default)]
    pub show_delay_factor: bool,
    /// Always compose through a full gray frame buffer.
    #[serde(default)]
    pub force_safe_framebuffer: bool,
}

fn default_true() -> bool {
    true
}
fn default_one() -> u16 {
    1
}
fn default_ring_chunks() -> usize {
    4
}
fn default_sample_rate() -> u32 {
    AudioFormat::default().sample_rate
}
fn default_frame_rate() -> u32 {
    AudioFormat::default().frame_rate_millihz
}

impl Default for Options {
    fn default() -> Self {
        Self {
            enable_audio: default_true(),
            interlace: false,
            half_refresh: false,
            sram_auto_commit: default_true(),
            multi_press_mode: MultiPressMode::default(),
            sync_rtc_on_resume: false,
            manual_rtc: false,
            button_hold_compensation_num: default_one(),
            button_hold_compensation_denom: default_one(),
            audio_ring_chunks: default_ring_chunks(),
            audio_sample_rate: default_sample_rate(),
            frame_rate_millihz: default_frame_rate(),
        }
    }
}

impl Options {
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.audio_sample_rate,
            frame_rate_millihz: self.frame_rate_millihz,
        }
    }
}

impl Config {
    pub fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        Ok(config.sanitized())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&text, &path.display().to_string())?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Replaces values the runtime cannot work with.
    pub fn sanitized(mut self) -> Self {
        let options = &mut self.options;
        if options.button_hold_compensation_num == 0 {
            warn!("button_hold_compensation_num is 0, using 1");
            options.button_hold_compensation_num = 1;
        }
        if options.button_hold_compensation_denom == 0 {
            warn!("button_hold_compensation_denom is 0, using 1");
            options.button_hold_compensation_denom = 1;
        }
        if options.audio_ring_chunks < 2 {
            warn!(
                chunks = options.audio_ring_chunks,
                "audio ring needs at least 2 chunks"
            );
            options.audio_ring_chunks = 2;
        }
        if options.audio_sample_rate == 0 {
            options.audio_sample_rate = default_sample_rate();
        }
        if options.frame_rate_millihz == 0 {
            options.frame_rate_millihz = default_frame_rate();
        }
        self
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keycode;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::parse("", "inline").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.options.enable_audio);
        assert!(config.options.sram_auto_commit);
        assert_eq!(config.options.multi_press_mode, MultiPressMode::TimeoutSimulation);
        assert_eq!(config.options.audio_ring_chunks, 4);
        assert!(!config.options.manual_rtc);
        assert_eq!(config.key_binding.quit, keycode::ESC);
    }

    #[test]
    fn sections_override_individual_keys() {
        let config = Config::parse(
            r#"
            [config]
            enable_audio = false
            multi_press_mode = "discrete-polling"
            button_hold_compensation_num = 3
            button_hold_compensation_denom = 4
            manual_rtc = true

            [debug]
            show_delay_factor = true

            [key_binding]
            quit = 0
            a = 65
            "#,
            "inline",
        )
        .unwrap();

        assert!(!config.options.enable_audio);
        assert_eq!(config.options.multi_press_mode, MultiPressMode::DiscretePolling);
        assert_eq!(config.options.button_hold_compensation_num, 3);
        assert_eq!(config.options.button_hold_compensation_denom, 4);
        assert!(config.options.manual_rtc);
        assert!(!config.options.sync_rtc_on_resume);
        assert!(config.debug.show_delay_factor);
        assert!(!config.debug.force_safe_framebuffer);
        assert_eq!(config.key_binding.quit, 0);
        assert_eq!(config.key_binding.a, 65);
        assert_eq!(config.key_binding.b, keycode::Z);
    }

    #[test]
    fn zero_ratio_and_tiny_ring_are_sanitized() {
        let config = Config::parse(
            "[config]\nbutton_hold_compensation_denom = 0\naudio_ring_chunks = 1\n",
            "inline",
        )
        .unwrap();
        assert_eq!(config.options.button_hold_compensation_denom, 1);
        assert_eq!(config.options.audio_ring_chunks, 2);
    }

    #[test]
    fn unknown_mode_is_a_parse_error() {
        let err =
            Config::parse("[config]\nmulti_press_mode = \"psychic\"\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbloop.toml");
        let mut config = Config::default();
        config.options.sync_rtc_on_resume = true;
        config.key_binding.mute = keycode::A;
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }
}
