// 文件: oscilla-config/src/lib.rs
// 作用: 弹簧配置：物理参数、起止值以及静止阈值。
//       配置既可以整体替换，也可以通过 SpringConfigPatch 局部修改。

//! Spring configuration: physical parameters, endpoints and rest thresholds.

#[macro_use]
extern crate tracing;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors produced while building or loading a spring configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A parameter is outside of its valid range.
    #[error("invalid spring configuration: {field} must be {requirement}, got {value}")]
    InvalidConfiguration {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },

    #[error("error reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error parsing spring configuration")]
    Json(#[from] serde_json::Error),
}

/// Full spring configuration.
///
/// Deserialized from JSON with camelCase keys. Missing keys take their default value and
/// unknown keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpringConfig {
    pub from_value: f64,
    pub to_value: f64,
    /// Spring constant k.
    pub stiffness: f64,
    /// Damping coefficient c.
    pub damping: f64,
    pub mass: f64,
    /// Velocity at the start of the run, in value units per second.
    pub initial_velocity: f64,
    /// Whether damping ratios above 1 are kept as is.
    ///
    /// When `false`, overdamped parameters are clamped down to critical damping.
    pub allows_overdamping: bool,
    /// Whether the value is prevented from crossing `to_value`.
    pub overshoot_clamping: bool,
    pub rest_displacement_threshold: f64,
    pub rest_speed_threshold: f64,
}

/// Partial update for a [`SpringConfig`]. Only the present fields are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpringConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stiffness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damping: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_velocity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allows_overdamping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overshoot_clamping: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_displacement_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_speed_threshold: Option<f64>,
}

impl Default for SpringConfig {
    fn default() -> Self {
        // Moderately bouncy: damping ratio ≈ 0.73.
        Self {
            from_value: 0.,
            to_value: 1.,
            stiffness: 230.,
            damping: 22.,
            mass: 1.,
            initial_velocity: 0.,
            allows_overdamping: false,
            overshoot_clamping: false,
            rest_displacement_threshold: 0.001,
            rest_speed_threshold: 0.001,
        }
    }
}

impl SpringConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;

        debug!("loaded spring config from {path:?}");
        Ok(config)
    }

    /// Parses and validates a configuration from JSON text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        finite("fromValue", self.from_value)?;
        finite("toValue", self.to_value)?;
        finite("initialVelocity", self.initial_velocity)?;

        positive("stiffness", self.stiffness)?;
        positive("mass", self.mass)?;
        // Without damping or with zero thresholds the spring never comes to rest.
        positive("damping", self.damping)?;

        positive("restDisplacementThreshold", self.rest_displacement_threshold)?;
        positive("restSpeedThreshold", self.rest_speed_threshold)?;

        Ok(())
    }

    /// Returns a copy of this config with the fields present in `patch` replaced.
    pub fn merged(&self, patch: &SpringConfigPatch) -> Self {
        Self {
            from_value: patch.from_value.unwrap_or(self.from_value),
            to_value: patch.to_value.unwrap_or(self.to_value),
            stiffness: patch.stiffness.unwrap_or(self.stiffness),
            damping: patch.damping.unwrap_or(self.damping),
            mass: patch.mass.unwrap_or(self.mass),
            initial_velocity: patch.initial_velocity.unwrap_or(self.initial_velocity),
            allows_overdamping: patch.allows_overdamping.unwrap_or(self.allows_overdamping),
            overshoot_clamping: patch.overshoot_clamping.unwrap_or(self.overshoot_clamping),
            rest_displacement_threshold: patch
                .rest_displacement_threshold
                .unwrap_or(self.rest_displacement_threshold),
            rest_speed_threshold: patch.rest_speed_threshold.unwrap_or(self.rest_speed_threshold),
        }
    }

    /// Damping ratio ζ = c / (2·sqrt(k·m)) of the configured parameters.
    pub fn damping_ratio(&self) -> f64 {
        self.damping / self.critical_damping()
    }

    /// Damping coefficient for which the spring is critically damped.
    pub fn critical_damping(&self) -> f64 {
        2. * (self.stiffness * self.mass).sqrt()
    }

    /// Damping coefficient actually used for integration.
    ///
    /// Equal to `damping` unless the spring is overdamped and overdamping is not allowed, in
    /// which case it is the critical damping.
    pub fn effective_damping(&self) -> f64 {
        let critical = self.critical_damping();
        if !self.allows_overdamping && self.damping > critical {
            critical
        } else {
            self.damping
        }
    }

    /// Whether the configured endpoints and velocity describe a spring that has nothing to do.
    pub fn is_settled(&self) -> bool {
        (self.from_value - self.to_value).abs() <= self.rest_displacement_threshold
            && self.initial_velocity.abs() <= self.rest_speed_threshold
    }
}

impl SpringConfigPatch {
    /// Parses a patch from JSON text. Unknown keys are ignored.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether the patch leaves every field untouched.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<SpringConfig> for SpringConfigPatch {
    fn from(config: SpringConfig) -> Self {
        Self {
            from_value: Some(config.from_value),
            to_value: Some(config.to_value),
            stiffness: Some(config.stiffness),
            damping: Some(config.damping),
            mass: Some(config.mass),
            initial_velocity: Some(config.initial_velocity),
            allows_overdamping: Some(config.allows_overdamping),
            overshoot_clamping: Some(config.overshoot_clamping),
            rest_displacement_threshold: Some(config.rest_displacement_threshold),
            rest_speed_threshold: Some(config.rest_speed_threshold),
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidConfiguration {
            field,
            requirement: "finite",
            value,
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0. {
        Ok(())
    } else {
        Err(ConfigError::InvalidConfiguration {
            field,
            requirement: "finite and greater than zero",
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn default_config_file_matches_defaults() {
        let text = include_str!("../../resources/default-spring.json");
        let config = SpringConfig::parse(text).unwrap();
        assert_eq!(config, SpringConfig::default());
    }

    #[test]
    fn missing_and_unknown_keys() {
        let config = SpringConfig::parse(r#"{ "toValue": 5, "bounciness": 3 }"#).unwrap();
        assert_eq!(config.to_value, 5.);
        assert_eq!(config.from_value, 0.);
        assert_eq!(config.stiffness, 230.);
    }

    #[test]
    fn merge_only_touches_present_fields() {
        let base = SpringConfig::default();
        let patch = SpringConfigPatch {
            to_value: Some(200.),
            rest_displacement_threshold: Some(0.01),
            ..Default::default()
        };

        let merged = base.merged(&patch);
        assert_eq!(merged.to_value, 200.);
        assert_eq!(merged.rest_displacement_threshold, 0.01);
        assert_eq!(
            SpringConfig {
                to_value: base.to_value,
                rest_displacement_threshold: base.rest_displacement_threshold,
                ..merged
            },
            base
        );
    }

    #[test]
    fn full_patch_replaces_config() {
        let config = SpringConfig {
            from_value: -2.,
            to_value: 7.,
            stiffness: 120.,
            overshoot_clamping: true,
            ..Default::default()
        };
        let patch = SpringConfigPatch::from(config);
        assert_eq!(SpringConfig::default().merged(&patch), config);

        let json = serde_json::to_string(&SpringConfigPatch {
            to_value: Some(7.),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"toValue":7.0}"#);
    }

    #[test]
    fn empty_patch() {
        let patch = SpringConfigPatch::parse("{}").unwrap();
        assert!(patch.is_empty());
        assert_eq!(SpringConfig::default().merged(&patch), SpringConfig::default());

        let patch = SpringConfigPatch::parse(r#"{ "initialVelocity": 200 }"#).unwrap();
        assert!(!patch.is_empty());
        assert_eq!(patch.initial_velocity, Some(200.));
    }

    #[test]
    fn rejects_degenerate_parameters() {
        let zero_mass = SpringConfig {
            mass: 0.,
            ..Default::default()
        };
        assert!(matches!(
            zero_mass.validate(),
            Err(ConfigError::InvalidConfiguration { field: "mass", .. })
        ));

        let negative_damping = SpringConfig {
            damping: -1.,
            ..Default::default()
        };
        assert!(matches!(
            negative_damping.validate(),
            Err(ConfigError::InvalidConfiguration {
                field: "damping",
                ..
            })
        ));

        let nan_target = SpringConfig {
            to_value: f64::NAN,
            ..Default::default()
        };
        assert!(nan_target.validate().is_err());

        let undamped = SpringConfig {
            damping: 0.,
            ..Default::default()
        };
        assert!(matches!(
            undamped.validate(),
            Err(ConfigError::InvalidConfiguration {
                field: "damping",
                ..
            })
        ));

        let zero_threshold = SpringConfig {
            rest_speed_threshold: 0.,
            ..Default::default()
        };
        assert!(matches!(
            zero_threshold.validate(),
            Err(ConfigError::InvalidConfiguration {
                field: "restSpeedThreshold",
                ..
            })
        ));

        let barely_damped = SpringConfig {
            damping: 0.1,
            ..Default::default()
        };
        assert!(barely_damped.validate().is_ok());
    }

    #[test]
    fn overdamping_is_clamped_unless_allowed() {
        let config = SpringConfig {
            stiffness: 100.,
            damping: 50.,
            mass: 1.,
            ..Default::default()
        };
        assert_abs_diff_eq!(config.damping_ratio(), 2.5);
        assert_abs_diff_eq!(config.effective_damping(), 20.);

        let config = SpringConfig {
            allows_overdamping: true,
            ..config
        };
        assert_abs_diff_eq!(config.effective_damping(), 50.);
    }

    #[test]
    fn settled_config() {
        let config = SpringConfig {
            from_value: 3.,
            to_value: 3.,
            ..Default::default()
        };
        assert!(config.is_settled());

        let kicked = SpringConfig {
            initial_velocity: 1.,
            ..config
        };
        assert!(!kicked.is_settled());
    }
}
