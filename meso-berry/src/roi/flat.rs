//! ROI 集合的扁平导出 (npz).

use super::{Hemisphere, RoiSet};
use crate::raster::MaskEncoding;
use crate::{MesoError, MesoResult};
use ndarray::{arr1, Array1, Array2, Ix1, Ix2, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

const META_PREFIX: &str = "__meta__/";

/// 按 "半球 -> 名字 -> 掩膜" 组织的 ROI 集合; `both` 的 ROI 位于顶层.
///
/// 只保存掩膜与身份信息, 不保存图谱编号和描述.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatRois {
    /// 图像名.
    pub image_name: String,

    /// 帧索引.
    pub frame_idx: i64,

    /// 总帧数.
    pub total_frames: i64,

    /// 左半球的 ROI.
    pub left: BTreeMap<String, Array2<u8>>,

    /// 右半球的 ROI.
    pub right: BTreeMap<String, Array2<u8>>,

    /// 不区分半球的 ROI.
    pub both: BTreeMap<String, Array2<u8>>,
}

impl From<&RoiSet> for FlatRois {
    fn from(set: &RoiSet) -> Self {
        let mut ret = FlatRois {
            image_name: set.image_name().to_owned(),
            frame_idx: set.frame_idx(),
            total_frames: set.total_frames(),
            ..Default::default()
        };
        for roi in set {
            ret.side_mut(roi.side)
                .insert(roi.name.clone(), roi.mask.clone());
        }
        ret
    }
}

impl FlatRois {
    fn side_mut(&mut self, side: Hemisphere) -> &mut BTreeMap<String, Array2<u8>> {
        match side {
            Hemisphere::Left => &mut self.left,
            Hemisphere::Right => &mut self.right,
            Hemisphere::Both => &mut self.both,
        }
    }

    /// 所有掩膜及其在归档中的键 (`left/<name>`, `right/<name>`, `<name>`).
    pub fn entries(&self) -> impl Iterator<Item = (String, &Array2<u8>)> + '_ {
        nested(Hemisphere::Left, &self.left)
            .chain(nested(Hemisphere::Right, &self.right))
            .chain(self.both.iter().map(|(k, v)| (k.clone(), v)))
    }

    /// 写入 npz 归档, 掩膜按 `encoding` 编码.
    pub fn write_npz<P: AsRef<Path>>(&self, path: P, encoding: MaskEncoding) -> MesoResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut npz = NpzWriter::new(File::create(path)?);
        for (key, mask) in self.entries() {
            npz.add_array(key, &encoding.encode(mask.view()))?;
        }
        npz.add_array(
            format!("{META_PREFIX}image_name"),
            &Array1::from(self.image_name.as_bytes().to_vec()),
        )?;
        npz.add_array(format!("{META_PREFIX}frame_idx"), &arr1(&[self.frame_idx]))?;
        npz.add_array(
            format!("{META_PREFIX}total_frames"),
            &arr1(&[self.total_frames]),
        )?;
        npz.finish()?;
        Ok(())
    }

    /// 读取 npz 归档, 掩膜由 `encoding` 转换为内部编码.
    ///
    /// 身份信息缺失或格式错误时返回 `Serialization` 错误.
    pub fn read_npz<P: AsRef<Path>>(path: P, encoding: MaskEncoding) -> MesoResult<Self> {
        let mut npz = NpzReader::new(File::open(path)?)?;
        let keys: Vec<String> = npz
            .names()?
            .into_iter()
            .map(|n| n.strip_suffix(".npy").map(String::from).unwrap_or(n))
            .collect();

        let mut scalar = |name: &str| -> MesoResult<i64> {
            let a = npz.by_name::<OwnedRepr<i64>, Ix1>(&format!("{META_PREFIX}{name}.npy"))?;
            a.first()
                .copied()
                .ok_or_else(|| MesoError::serial(format!("empty `{name}` entry")))
        };
        let frame_idx = scalar("frame_idx")?;
        let total_frames = scalar("total_frames")?;
        let image_name =
            npz.by_name::<OwnedRepr<u8>, Ix1>(&format!("{META_PREFIX}image_name.npy"))?;
        let image_name = String::from_utf8(image_name.to_vec())
            .map_err(|e| MesoError::serial(format!("image name is not UTF-8: {e}")))?;

        let mut ret = FlatRois {
            image_name,
            frame_idx,
            total_frames,
            ..Default::default()
        };
        for key in keys.iter().filter(|k| !k.starts_with(META_PREFIX)) {
            let mask = npz.by_name::<OwnedRepr<u8>, Ix2>(&format!("{key}.npy"))?;
            let (side, name) = match key.split_once('/') {
                Some((side, name)) => {
                    let side = side
                        .parse::<Hemisphere>()
                        .map_err(|e| MesoError::serial(format!("entry `{key}`: {e}")))?;
                    (side, name)
                }
                None => (Hemisphere::Both, key.as_str()),
            };
            ret.side_mut(side)
                .insert(name.to_owned(), encoding.decode(mask.view()));
        }
        Ok(ret)
    }
}

fn nested(
    side: Hemisphere,
    m: &BTreeMap<String, Array2<u8>>,
) -> impl Iterator<Item = (String, &Array2<u8>)> + '_ {
    m.iter().map(move |(k, v)| (format!("{side}/{k}"), v))
}

#[cfg(test)]
mod tests {
    use super::FlatRois;
    use crate::raster::MaskEncoding;
    use crate::roi::{Hemisphere, Roi, RoiFileType, RoiSet};
    use ndarray::{array, Array2};

    fn sample() -> RoiSet {
        RoiSet::new(
            "mouse02.mp4",
            3,
            10,
            vec![
                Roi::new("outline", Hemisphere::Both, -1, "", array![[0u8, 255], [255, 255]]),
                Roi::new("outline", Hemisphere::Left, -1, "", array![[0u8, 255], [0, 0]]),
                Roi::new("VISp", Hemisphere::Right, 385, "", array![[255u8, 0], [0, 0]]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_flat_layout() {
        let flat = FlatRois::from(&sample());
        let keys: Vec<_> = flat.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, ["left/outline", "right/VISp", "outline"]);
        assert_eq!(flat.right["VISp"], array![[255u8, 0], [0, 0]]);
    }

    #[test]
    fn test_npz_round_trip_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame03.npz");
        let flat = FlatRois::from(&sample());
        flat.write_npz(&path, MaskEncoding::Unit).unwrap();

        // 以 0/1 读取原样数据.
        let raw = FlatRois::read_npz(&path, MaskEncoding::Byte).unwrap();
        assert_eq!(raw.both["outline"], array![[0u8, 1], [1, 1]]);

        let back = FlatRois::read_npz(&path, MaskEncoding::Unit).unwrap();
        assert_eq!(back, flat);
    }

    #[test]
    fn test_roi_set_to_npz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.npz");
        sample().to_file(&path, RoiFileType::Npz).unwrap();
        let back = FlatRois::read_npz(&path, MaskEncoding::Byte).unwrap();
        assert_eq!(back.image_name, "mouse02.mp4");
        assert_eq!(back.total_frames, 10);
        assert_eq!(back.left.len(), 1);
        assert_eq!(
            back.left["outline"],
            Array2::from_shape_vec((2, 2), vec![0, 255, 0, 0]).unwrap()
        );
    }
}
