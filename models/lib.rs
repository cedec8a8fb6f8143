#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod homogeneous;

#[path = "../utils/mod.rs"]
pub mod utils;

#[path = "../voxel/mod.rs"]
pub mod voxel_model;
