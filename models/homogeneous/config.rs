use super::subset_selection::{
    ConditioningError, backward_subset_selection_conditioning,
    forward_subset_selection_conditioning,
};
use ndarray::{Array2, ArrayBase, Data, Ix2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which driver is used to reach the target condition number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditioningStrategy {
    /// Drop columns one at a time, starting from the full design.
    /// Keeps as many columns as possible when most of them are well behaved.
    #[default]
    Backward,
    /// Grow a selection from a single column.
    /// Suited to designs where most columns are redundant.
    Forward,
}

/// Settings for conditioning a design matrix, readable from TOML.
///
/// ```toml
/// kappa = 1000.0
/// strategy = "backward"
/// ```
///
/// `kappa = inf` disables conditioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    pub kappa: f64,
    pub strategy: ConditioningStrategy,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            kappa: 1000.0,
            strategy: ConditioningStrategy::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse conditioning config: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Failed to serialize conditioning config: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("kappa must be a number or inf, but was {0}.")]
    InvalidKappa(f64),
}

impl ConditioningConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        if config.kappa.is_nan() {
            return Err(ConfigError::InvalidKappa(config.kappa));
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Runs the configured driver on `x`.
    pub fn condition<S>(
        &self,
        x: &ArrayBase<S, Ix2>,
    ) -> Result<(Array2<f64>, Vec<usize>), ConditioningError>
    where
        S: Data<Elem = f64>,
    {
        log::debug!(
            "Conditioning {}x{} design with {:?} strategy, kappa = {}",
            x.nrows(),
            x.ncols(),
            self.strategy,
            self.kappa
        );
        match self.strategy {
            ConditioningStrategy::Backward => backward_subset_selection_conditioning(x, self.kappa),
            ConditioningStrategy::Forward => forward_subset_selection_conditioning(x, self.kappa),
        }
    }
}
