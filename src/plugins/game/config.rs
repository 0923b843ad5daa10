use std::{fs, path::Path};

use serde::Deserialize;

use crate::plugins::{first_person_controller::PlayerControllerConfig, portal_gun::PortalGunConfig};

pub const CONFIG_PATH: &str = "assets/config/game.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Game tuning, read from [`CONFIG_PATH`] at startup.
pub struct GameConfig {
    /// Simulation ticks per second.
    pub tick_rate_hz: f32,
    pub player: PlayerControllerConfig,
    pub portal_gun: PortalGunConfig,
    /// Whether the player owns the gun of each slot from the start.
    pub start_with_guns: [bool; 2],
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            tick_rate_hz: 30.,
            player: PlayerControllerConfig::default(),
            portal_gun: PortalGunConfig::default(),
            start_with_guns: [true, true],
        }
    }
}

impl GameConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<GameConfig, String> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Could not read {}: {}", path.display(), e))?;
        GameConfig::parse(&text).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<GameConfig, String> {
        let config: GameConfig = serde_json::from_str(text).map_err(|e| e.to_string())?;
        if config.tick_rate_hz.is_nan() || config.tick_rate_hz <= 0. {
            return Err(format!("tick_rate_hz must be positive, got {}", config.tick_rate_hz));
        }
        Ok(config)
    }

    /// Duration of a simulation tick, in seconds.
    pub fn tick_duration(&self) -> f32 {
        1. / self.tick_rate_hz
    }
}
