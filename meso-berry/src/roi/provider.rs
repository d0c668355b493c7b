//! 参考图谱资源.

use super::RoiSet;
use crate::MesoResult;

/// 提供参考图谱 ROI 与左右两半轮廓, 均位于 512x512 标准帧中.
pub trait AtlasProvider {
    /// 参考图谱的 ROI 集合.
    fn reference_rois(&self) -> MesoResult<RoiSet>;

    /// 左右两半轮廓, 各一个, 名字均为 `outline`.
    fn outlines(&self) -> MesoResult<RoiSet>;
}

/// 内存中的图谱资源.
#[derive(Clone, Debug)]
pub struct StaticAtlas {
    reference: RoiSet,
    outline: RoiSet,
}

impl StaticAtlas {
    /// 构造.
    pub fn new(reference: RoiSet, outline: RoiSet) -> Self {
        Self { reference, outline }
    }
}

impl AtlasProvider for StaticAtlas {
    fn reference_rois(&self) -> MesoResult<RoiSet> {
        Ok(self.reference.clone())
    }

    fn outlines(&self) -> MesoResult<RoiSet> {
        Ok(self.outline.clone())
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        use super::{Hemisphere, Roi};
        use crate::consts::files::{ATLAS_MASK_FILE, LEFT_OUTLINE_FILE, RIGHT_OUTLINE_FILE};
        use crate::consts::{OUTLINE_DESCRIPTION, OUTLINE_NAME};
        use crate::raster::load_png_mask;
        use crate::MesoError;
        use std::path::{Path, PathBuf};

        /// 目录中的图谱资源.
        ///
        /// 目录下需有 `reference_masks.roi` (ROI 容器), `atlas_outline_left.png`
        /// 与 `atlas_outline_right.png`. 任一文件缺失时返回 `NotFound` 错误.
        #[derive(Clone, Debug)]
        pub struct DirectoryAtlas {
            dir: PathBuf,
        }

        impl DirectoryAtlas {
            /// 以 `dir` 为资源目录.
            pub fn new<P: AsRef<Path>>(dir: P) -> Self {
                Self { dir: dir.as_ref().to_path_buf() }
            }

            /// 资源目录.
            #[inline]
            pub fn dir(&self) -> &Path {
                &self.dir
            }

            fn existing(&self, name: &str) -> MesoResult<PathBuf> {
                let path = self.dir.join(name);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(MesoError::NotFound(format!("atlas asset `{}`", path.display())))
                }
            }

            fn outline(&self, name: &str, side: Hemisphere) -> MesoResult<Roi> {
                let mask = load_png_mask(self.existing(name)?)?;
                Ok(Roi::new(OUTLINE_NAME, side, -1, OUTLINE_DESCRIPTION, mask))
            }
        }

        impl AtlasProvider for DirectoryAtlas {
            fn reference_rois(&self) -> MesoResult<RoiSet> {
                RoiSet::load(self.existing(ATLAS_MASK_FILE)?)
            }

            fn outlines(&self) -> MesoResult<RoiSet> {
                RoiSet::reference(vec![
                    self.outline(LEFT_OUTLINE_FILE, Hemisphere::Left)?,
                    self.outline(RIGHT_OUTLINE_FILE, Hemisphere::Right)?,
                ])
            }
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::{AtlasProvider, DirectoryAtlas};
    use crate::consts::files::{ATLAS_MASK_FILE, LEFT_OUTLINE_FILE, RIGHT_OUTLINE_FILE};
    use crate::raster::save_png;
    use crate::roi::{Hemisphere, ProjectConfig, Roi, RoiProjector, RoiSet};
    use crate::MesoError;
    use ndarray::Array2;

    #[test]
    fn test_directory_atlas() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = DirectoryAtlas::new(dir.path());
        assert!(matches!(atlas.outlines(), Err(MesoError::NotFound(_))));
        assert!(matches!(
            RoiProjector::new(&atlas, ProjectConfig::default()),
            Err(MesoError::NotFound(_))
        ));

        let mut left = Array2::<u8>::zeros((8, 8));
        left[(2, 2)] = 17;
        save_png(left.view(), dir.path().join(LEFT_OUTLINE_FILE)).unwrap();
        save_png(Array2::<u8>::zeros((8, 8)).view(), dir.path().join(RIGHT_OUTLINE_FILE)).unwrap();
        RoiSet::reference(vec![Roi::new(
            "MOs",
            Hemisphere::Left,
            993,
            "secondary motor area",
            Array2::zeros((8, 8)),
        )])
        .unwrap()
        .save(dir.path().join(ATLAS_MASK_FILE))
        .unwrap();

        let outline = atlas.outlines().unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline.get(Hemisphere::Left, "outline").unwrap().mask[(2, 2)], 255);
        assert_eq!(atlas.reference_rois().unwrap().names(), ["MOs"]);
        assert!(RoiProjector::new(&atlas, ProjectConfig::default()).is_ok());
    }
}
