pub mod masks;

pub use masks::{Hemisphere, Mask, MaskError, StructureAtlas, union_mask};
