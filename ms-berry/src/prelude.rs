//! 🧠欢迎光临🫐
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::error::{InferenceError, PipelineError};

pub use crate::volume::{tissue_bounds, MriVolume};

pub use crate::render::{choose_indices, render_slice, RenderOptions};

pub use crate::tile::{extract_patches, tile_coords};

pub use crate::model::{predict_batched, OnnxPatchClassifier, PatchClassifier};

pub use crate::pipeline::{
    predict_slices, predict_volume, preprocess_volume, preview_to_dir, render_preview,
    render_samples, PipelineConfig, RenderedSlice, SliceResult,
};

pub use crate::dataset::{
    export_volume_slices, patch_is_interesting, split_image_into_patches, write_manifest,
    ManifestRow, PatchFilter,
};

pub use crate::consts::{
    DEFAULT_BATCH_SIZE, DEFAULT_N_SLICES, DEFAULT_PATCH_SIZE, DEFAULT_SLICE_SIZE, DEFAULT_STRIDE,
};
