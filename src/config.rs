//! Environment-based configuration.
//!
//! All settings are optional. Invalid values are reported as errors instead of being replaced by
//! defaults.

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context};

use crate::{
    face::facemesh::NUM_LANDMARKS,
    image::Resolution,
    mesh::{self, TriangulationTable},
};

pub const ENV_MODEL: &str = "FACESKETCH_MODEL";
pub const ENV_TRIANGULATION: &str = "FACESKETCH_TRIANGULATION";
pub const ENV_WEBCAM_NAME: &str = "FACESKETCH_WEBCAM_NAME";
pub const ENV_RESOLUTION: &str = "FACESKETCH_RESOLUTION";
pub const ENV_INTERVAL_MS: &str = "FACESKETCH_INTERVAL_MS";
pub const ENV_ROUGHNESS: &str = "FACESKETCH_ROUGHNESS";

const DEFAULT_MODEL: &str = "3rdparty/onnx/face_landmark.onnx";
const DEFAULT_INTERVAL: Duration = Duration::from_millis(40);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path to the `face_landmark.onnx` network.
    pub model: PathBuf,
    /// Replacement for the built-in face mesh triangulation.
    pub triangulation: Option<PathBuf>,
    /// Name of the webcam device to open. Any supported device is used if `None`.
    pub webcam_name: Option<String>,
    /// Requested capture resolution.
    pub resolution: Resolution,
    /// Time between two detection ticks.
    pub interval: Duration,
    pub roughness: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: PathBuf::from(DEFAULT_MODEL),
            triangulation: None,
            webcam_name: None,
            resolution: Resolution::RES_VGA,
            interval: DEFAULT_INTERVAL,
            roughness: 1.0,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("invalid value for `{key}`")),
        })
    }

    /// Builds a configuration from a variable lookup function.
    ///
    /// Empty values are treated like unset variables.
    pub fn from_lookup<F>(mut lookup: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> anyhow::Result<Option<String>>,
    {
        let mut get = |key: &str| -> anyhow::Result<Option<String>> {
            Ok(lookup(key)?.filter(|v| !v.trim().is_empty()))
        };

        let mut config = Self::default();
        if let Some(model) = get(ENV_MODEL)? {
            config.model = model.into();
        }
        config.triangulation = get(ENV_TRIANGULATION)?.map(PathBuf::from);
        config.webcam_name = get(ENV_WEBCAM_NAME)?;
        if let Some(res) = get(ENV_RESOLUTION)? {
            config.resolution = res
                .parse()
                .with_context(|| format!("invalid value for `{ENV_RESOLUTION}`"))?;
        }
        if let Some(ms) = get(ENV_INTERVAL_MS)? {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("invalid value for `{ENV_INTERVAL_MS}`: '{ms}'"))?;
            if ms == 0 {
                bail!("`{ENV_INTERVAL_MS}` must be greater than 0");
            }
            config.interval = Duration::from_millis(ms);
        }
        if let Some(roughness) = get(ENV_ROUGHNESS)? {
            let value: f32 = roughness
                .trim()
                .parse()
                .with_context(|| format!("invalid value for `{ENV_ROUGHNESS}`: '{roughness}'"))?;
            if !(value >= 0.0 && value.is_finite()) {
                bail!("`{ENV_ROUGHNESS}` must be a non-negative number, got {value}");
            }
            config.roughness = value;
        }

        Ok(config)
    }

    /// Loads the triangulation table to use and checks it against the landmark model.
    pub fn triangulation_table(&self) -> anyhow::Result<Arc<TriangulationTable>> {
        let table = match &self.triangulation {
            Some(path) => {
                log::info!("using triangulation from '{}'", path.display());
                TriangulationTable::load(path)?
            }
            None => mesh::face_mesh().clone(),
        };
        table.validate(NUM_LANDMARKS)?;
        log::debug!("triangulation has {} triangles", table.num_triangles());
        Ok(Arc::new(table))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|key| Ok(vars.get(key).cloned()))
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.interval, Duration::from_millis(40));
        assert_eq!(config.resolution, Resolution::new(640, 480));
    }

    #[test]
    fn reads_all_values() {
        let config = parse(&[
            (ENV_MODEL, "models/face.onnx"),
            (ENV_TRIANGULATION, "tri.txt"),
            (ENV_WEBCAM_NAME, "HD Webcam"),
            (ENV_RESOLUTION, "1280x720"),
            (ENV_INTERVAL_MS, "100"),
            (ENV_ROUGHNESS, "2.5"),
        ])
        .unwrap();
        assert_eq!(config.model, PathBuf::from("models/face.onnx"));
        assert_eq!(config.triangulation, Some(PathBuf::from("tri.txt")));
        assert_eq!(config.webcam_name.as_deref(), Some("HD Webcam"));
        assert_eq!(config.resolution, Resolution::RES_720P);
        assert_eq!(config.interval, Duration::from_millis(100));
        assert_eq!(config.roughness, 2.5);
    }

    #[test]
    fn empty_values_are_unset() {
        let config = parse(&[(ENV_WEBCAM_NAME, ""), (ENV_INTERVAL_MS, " ")]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn rejects_invalid_values() {
        for vars in [
            [(ENV_INTERVAL_MS, "0")],
            [(ENV_INTERVAL_MS, "-5")],
            [(ENV_INTERVAL_MS, "fast")],
            [(ENV_ROUGHNESS, "-1")],
            [(ENV_ROUGHNESS, "NaN")],
            [(ENV_RESOLUTION, "640")],
        ] {
            let err = parse(&vars).unwrap_err();
            assert!(
                format!("{err:#}").contains(vars[0].0),
                "error for {vars:?} does not name the variable: {err:#}"
            );
        }
    }

    #[test]
    fn builtin_triangulation_is_valid() {
        let table = Config::default().triangulation_table().unwrap();
        assert_eq!(table.num_triangles(), 880);
    }

    #[test]
    fn missing_triangulation_override_is_an_error() {
        let config = Config {
            triangulation: Some(PathBuf::from("/nonexistent/triangulation.txt")),
            ..Config::default()
        };
        assert!(config.triangulation_table().is_err());
    }
}
