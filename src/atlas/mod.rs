//! Sprite sheet packing, the frame/anchor metadata document, and preview
//! strip derivation.

mod assemble;

pub use assemble::{
    ATLAS_COLS, ATLAS_ROWS, AtlasBundle, AtlasMetadata, FrameRect, PREVIEW_STEMS, PerClip,
    PerDirection, Scales, assemble, preview_stem,
};
