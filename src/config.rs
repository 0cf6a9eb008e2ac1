use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, SimError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub observer: ObserverConfig,
    pub texture: TextureConfig,
    pub views: ViewsConfig,
    pub simulation: SimulationConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocateMode {
    Fixed,
    Ip,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub name: String,
    pub latitude: Option<f64>,  // degrees
    pub longitude: Option<f64>, // degrees
    pub locate: LocateMode,
    pub locate_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    pub primary_size: u32,
    pub primary_radius: f64,
    pub side_size: u32,
    pub side_radius: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub gm: f64,
    pub radial_damping: f64,
    pub escape_radius: f64,
    pub frame_rate: f64, // Hz
    pub path_step: f64,  // radians
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub interval_refresh_ms: u64,
    pub event_log_lines: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            name: "Home".to_string(),
            latitude: None,
            longitude: None,
            locate: LocateMode::Fixed,
            locate_url: "http://ip-api.com/json".to_string(),
        }
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("2k_earth_daymap.jpg"),
        }
    }
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            primary_size: 640,
            primary_radius: 300.0,
            side_size: 240,
            side_radius: 100.0,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gm: 1.0,
            radial_damping: 0.1,
            escape_radius: 50.0,
            frame_rate: 30.0,
            path_step: 0.01,
            seed: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            interval_refresh_ms: 1000,
            event_log_lines: 100,
        }
    }
}

impl Config {
    /// Reads `path`; a missing file means all defaults, a malformed one is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => {
                return Err(SimError::Config {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };
        let config: Config = toml::from_str(&contents).map_err(|e| SimError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/overpass.toml").unwrap();
        assert_eq!(config.simulation.gm, 1.0);
        assert_eq!(config.simulation.radial_damping, 0.1);
        assert_eq!(config.views.primary_radius, 300.0);
        assert_eq!(config.views.side_radius, 100.0);
        assert_eq!(config.observer.locate, LocateMode::Fixed);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[observer]\nlatitude = 12.97\nlongitude = 77.59\nlocate = \"fixed\"\n\n[simulation]\nseed = 7"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.observer.latitude, Some(12.97));
        assert_eq!(config.observer.longitude, Some(77.59));
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.escape_radius, 50.0);
        assert_eq!(config.display.interval_refresh_ms, 1000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[observer\nlatitude = ").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, SimError::Config { .. }));
    }
}
