//! Cast integration settings.
//!
//! Settings are resolved in three layers:
//! 1. the embedded `pmocast.yaml` defaults,
//! 2. an optional YAML file (explicit path, else `$PMOCAST_CONFIG`),
//! 3. `PMOCAST_CONFIG__<KEY>` environment variables.

use std::{env, fs, path::Path};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::discovery::ResetPolicy;
use crate::platform::CAST_ROUTE_CATEGORY;

const DEFAULT_SETTINGS: &str = include_str!("pmocast.yaml");

const ENV_CONFIG_FILE: &str = "PMOCAST_CONFIG";
const ENV_PREFIX: &str = "PMOCAST_CONFIG__";

pub const DEFAULT_MEDIA_APP_ID: &str = "CC1AD845";
pub const DEFAULT_WEB_APP_NAMESPACE: &str = "urn:x-cast:com.connectsdk";
pub const DEFAULT_VOLUME_STEP: f32 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastSettings {
    pub media_app_id: String,
    pub web_app_namespace: String,
    pub route_category: String,
    pub active_scan: bool,
    pub reset_policy: ResetPolicy,
    pub volume_step: f32,
}

impl Default for CastSettings {
    fn default() -> Self {
        Self {
            media_app_id: DEFAULT_MEDIA_APP_ID.to_string(),
            web_app_namespace: DEFAULT_WEB_APP_NAMESPACE.to_string(),
            route_category: CAST_ROUTE_CATEGORY.to_string(),
            active_scan: true,
            reset_policy: ResetPolicy::Silent,
            volume_step: DEFAULT_VOLUME_STEP,
        }
    }
}

impl CastSettings {
    /// Loads settings from `path`, or from `$PMOCAST_CONFIG` when no path is
    /// given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => env::var_os(ENV_CONFIG_FILE).map(Into::into),
        };

        let external = match &file {
            Some(p) => {
                info!("Loading Cast settings from {}", p.display());
                let text = fs::read_to_string(p)
                    .with_context(|| format!("Cannot read Cast settings {}", p.display()))?;
                Some(text)
            }
            None => None,
        };

        Self::resolve(external.as_deref(), env::vars())
    }

    /// Parses settings from YAML text layered over the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::resolve(Some(yaml), std::iter::empty())
    }

    fn resolve<I>(external: Option<&str>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut value: Value =
            serde_yaml::from_str(DEFAULT_SETTINGS).context("Invalid embedded Cast settings")?;

        if let Some(text) = external {
            let parsed: Value = serde_yaml::from_str(text).context("Invalid Cast settings YAML")?;
            merge_yaml(&mut value, &lower_keys(parsed));
        }

        apply_env_overrides(&mut value, vars);

        let settings: CastSettings =
            serde_yaml::from_value(value).context("Cast settings do not match the schema")?;
        settings.validate()?;
        debug!(?settings, "Cast settings resolved");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.media_app_id.trim().is_empty() {
            return Err(anyhow!("media_app_id must not be empty"));
        }
        if !self.web_app_namespace.starts_with("urn:x-cast:") {
            return Err(anyhow!(
                "web_app_namespace must start with urn:x-cast: (got {})",
                self.web_app_namespace
            ));
        }
        if !(self.volume_step > 0.0 && self.volume_step <= 1.0) {
            return Err(anyhow!("volume_step must be in (0, 1] (got {})", self.volume_step));
        }
        Ok(())
    }
}

fn apply_env_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let Value::Mapping(map) = config else {
        return;
    };
    for (key, value) in vars {
        if let Some(name) = key.strip_prefix(ENV_PREFIX) {
            let yaml_value =
                serde_yaml::from_str::<Value>(&value).unwrap_or(Value::String(value.clone()));
            map.insert(Value::String(name.to_lowercase()), yaml_value);
        }
    }
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut lowered = Mapping::new();
            for (k, v) in map {
                let k = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                lowered.insert(k, lower_keys(v));
            }
            Value::Mapping(lowered)
        }
        other => other,
    }
}

fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let settings = CastSettings::from_yaml_str("{}").unwrap();
        assert_eq!(settings, CastSettings::default());
        assert_eq!(settings.web_app_namespace, "urn:x-cast:com.connectsdk");
        assert_eq!(settings.media_app_id, "CC1AD845");
    }

    #[test]
    fn test_file_values_override_defaults() {
        let settings = CastSettings::from_yaml_str(
            "MEDIA_APP_ID: 5CB45E5A\nreset_policy: notify_removed\n",
        )
        .unwrap();
        assert_eq!(settings.media_app_id, "5CB45E5A");
        assert_eq!(settings.reset_policy, ResetPolicy::NotifyRemoved);
        assert!(settings.active_scan);
    }

    #[test]
    fn test_env_overrides_win() {
        let vars = vec![
            ("PMOCAST_CONFIG__VOLUME_STEP".to_string(), "0.05".to_string()),
            ("PMOCAST_CONFIG__ACTIVE_SCAN".to_string(), "false".to_string()),
            ("UNRELATED".to_string(), "1".to_string()),
        ];
        let settings = CastSettings::resolve(Some("volume_step: 0.2"), vars).unwrap();
        assert!((settings.volume_step - 0.05).abs() < f32::EPSILON);
        assert!(!settings.active_scan);
    }

    #[test]
    fn test_invalid_volume_step_is_rejected() {
        let err = CastSettings::from_yaml_str("volume_step: 0").unwrap_err();
        assert!(err.to_string().contains("volume_step"));
    }

    #[test]
    fn test_namespace_must_be_cast_urn() {
        assert!(CastSettings::from_yaml_str("web_app_namespace: com.example").is_err());
    }
}
