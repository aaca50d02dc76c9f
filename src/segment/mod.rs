//! Limb layer classification and core inpainting.

mod limbs;

pub use limbs::{ARM_RADIUS_PX, LEG_RADIUS_PX, LayerSet, Pivots, segment_limbs};
