//! Viewer configuration loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use catalog::Category;
use foundation::math::GeoPoint;
use scene::{DistanceRange, VisibilityPolicy};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_load_radius_km() -> f64 {
    30.0
}

fn default_probe_radius_km() -> f64 {
    0.3
}

fn default_revert_delay_ms() -> u64 {
    5000
}

fn default_probe_attempts() -> u32 {
    20
}

fn default_probe_offset_px() -> [f64; 2] {
    [0.0, 1.0]
}

fn default_distance_km() -> [f64; 2] {
    [0.01, 20.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewerConfig {
    /// Working-set radius around the camera center.
    #[serde(default = "default_load_radius_km")]
    pub load_radius_km: f64,
    /// Search radius around a probed map position.
    #[serde(default = "default_probe_radius_km")]
    pub probe_radius_km: f64,
    /// How long an inspected label stays up.
    #[serde(default = "default_revert_delay_ms")]
    pub revert_delay_ms: u64,
    /// Screen positions tried before a probe gives up.
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,
    /// Step between probe attempts, in pixels.
    #[serde(default = "default_probe_offset_px")]
    pub probe_offset_px: [f64; 2],
    #[serde(default)]
    pub initial_center: CenterConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CenterConfig {
    pub lat: f64,
    pub lon: f64,
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            lat: 43.274149,
            lon: -4.832612,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Categories shown from the start, e.g. `["peak", "water_body"]`.
    #[serde(default)]
    pub show: BTreeSet<Category>,
    /// Label display window as two slider values in kilometers.
    #[serde(default = "default_distance_km")]
    pub distance_km: [f64; 2],
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            show: BTreeSet::new(),
            distance_km: default_distance_km(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            load_radius_km: default_load_radius_km(),
            probe_radius_km: default_probe_radius_km(),
            revert_delay_ms: default_revert_delay_ms(),
            probe_attempts: default_probe_attempts(),
            probe_offset_px: default_probe_offset_px(),
            initial_center: CenterConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {v}")))
            }
        };
        positive("load_radius_km", self.load_radius_km)?;
        positive("probe_radius_km", self.probe_radius_km)?;

        if self.probe_attempts == 0 {
            return Err(ConfigError::Invalid(
                "probe_attempts must be at least 1".to_string(),
            ));
        }
        if !self.probe_offset_px.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::Invalid(
                "probe_offset_px must be finite".to_string(),
            ));
        }
        if !self.initial_center().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "initial_center out of range: {:?}",
                self.initial_center
            )));
        }
        let [a, b] = self.policy.distance_km;
        if !(a.is_finite() && b.is_finite() && a >= 0.0 && b >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "policy.distance_km must be two non-negative values, got [{a}, {b}]"
            )));
        }
        Ok(())
    }

    pub fn initial_center(&self) -> GeoPoint {
        GeoPoint::new(self.initial_center.lat, self.initial_center.lon)
    }

    pub fn revert_delay(&self) -> Duration {
        Duration::from_millis(self.revert_delay_ms)
    }

    pub fn visibility_policy(&self) -> VisibilityPolicy {
        let [a, b] = self.policy.distance_km;
        Category::ALL.into_iter().fold(
            VisibilityPolicy::new(DistanceRange::from_km_sliders(a, b)),
            |policy, c| policy.with_shown(c, self.policy.show.contains(&c)),
        )
    }
}
