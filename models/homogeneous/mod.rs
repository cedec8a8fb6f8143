pub mod config;
pub mod subset_selection;

pub use config::{ConditioningConfig, ConditioningStrategy, ConfigError};
pub use subset_selection::{
    ConditioningError, backward_subset_selection_conditioning, condition_number,
    forward_subset_selection_conditioning, svd_subset_selection,
};
