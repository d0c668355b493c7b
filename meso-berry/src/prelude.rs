//! 🐭欢迎光临🧠
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Point2d};
pub use crate::{MesoError, MesoResult};

pub use crate::affine::{compose, estimate, AffineTransform};

pub use crate::landmark::{
    reference_landmarks, validate, Landmark, LandmarkId, LandmarkSet, Pairing,
};

pub use crate::align::{AlignConfig, Alignment, AlignmentEstimator, HemisphereMode};

pub use crate::raster::{load_png_mask, save_png, MaskEncoding};

pub use crate::roi::{
    AtlasProvider, FlatRois, FrameMeta, Hemisphere, OutlineMerge, ProjectConfig, Roi, RoiFileType,
    RoiProjector, RoiSet, StaticAtlas,
};

#[cfg(feature = "serde")]
pub use crate::roi::DirectoryAtlas;

pub use crate::table::{
    load_alignment_table, load_detection_table, load_metadata_table, roi_file_path,
    save_alignment_table, save_landmark_table, save_metadata_table,
};
