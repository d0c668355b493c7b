//! ROI 集合的层次化容器格式.
//!
//! 文件由 8 字节魔数与一棵 `bincode` 编码的节点树组成:
//!
//! ```text
//! /                      attrs: image_name, frame_idx, total_frames
//! └── rois               attrs: names (去重后的名字), order (各 ROI 的路径)
//!     ├── <name>         `both` 的 ROI
//!     ├── left
//!     │   └── <name>     attrs: name, side, AllenID (可选), description
//!     └── right
//!         └── <name>
//! ```
//!
//! 掩膜以 zlib 压缩存储. 根节点的三个身份属性必须齐全.

use super::{Hemisphere, Roi, RoiSet};
use crate::{MesoError, MesoResult};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use bincode::Options;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 当前的容器格式版本.
pub const CONTAINER_VERSION: u32 = 2;

const MAGIC: &[u8; 8] = b"MESOROI\0";

const ROIS_GROUP: &str = "rois";

/// 从任意输入流读取时, 节点树编码的最大字节数.
const MAX_DOCUMENT_BYTES: u64 = 1 << 30;

/// 与 `bincode::serialize_into` 相同的定长整数编码, 解码时限制读取的总字节数.
fn codec(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Attr {
    Str(String),
    Int(i64),
    StrList(Vec<String>),
}

type Attrs = BTreeMap<String, Attr>;

#[derive(Clone, Debug, Serialize, Deserialize)]
enum Entry {
    Group(Group),
    Dataset(Dataset),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Group {
    attrs: Attrs,
    children: Vec<(String, Entry)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Dataset {
    attrs: Attrs,
    shape: (usize, usize),
    zlib: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    root: Group,
}

impl Group {
    fn child(&self, name: &str) -> Option<&Entry> {
        self.children.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    /// 按 `a/b/c` 形式的路径查找数据集.
    fn dataset(&self, path: &str) -> MesoResult<&Dataset> {
        let mut node = self;
        let mut parts = path.split('/').peekable();
        while let Some(part) = parts.next() {
            match (node.child(part), parts.peek().is_some()) {
                (Some(Entry::Group(g)), true) => node = g,
                (Some(Entry::Dataset(d)), false) => return Ok(d),
                _ => break,
            }
        }
        Err(MesoError::serial(format!("dangling ROI path `{path}`")))
    }
}

fn str_attr<'a>(attrs: &'a Attrs, key: &str) -> MesoResult<&'a str> {
    match attrs.get(key) {
        Some(Attr::Str(s)) => Ok(s),
        Some(_) => Err(MesoError::serial(format!("attribute `{key}` must be a string"))),
        None => Err(MesoError::serial(format!("missing attribute `{key}`"))),
    }
}

fn int_attr(attrs: &Attrs, key: &str) -> MesoResult<Option<i64>> {
    match attrs.get(key) {
        Some(Attr::Int(v)) => Ok(Some(*v)),
        Some(_) => Err(MesoError::serial(format!("attribute `{key}` must be an integer"))),
        None => Ok(None),
    }
}

fn required_int(attrs: &Attrs, key: &str) -> MesoResult<i64> {
    int_attr(attrs, key)?.ok_or_else(|| MesoError::serial(format!("missing attribute `{key}`")))
}

fn list_attr<'a>(attrs: &'a Attrs, key: &str) -> MesoResult<&'a [String]> {
    match attrs.get(key) {
        Some(Attr::StrList(v)) => Ok(v),
        Some(_) => Err(MesoError::serial(format!("attribute `{key}` must be a list"))),
        None => Err(MesoError::serial(format!("missing attribute `{key}`"))),
    }
}

impl Dataset {
    fn compress(roi: &Roi) -> MesoResult<Self> {
        let mut attrs = Attrs::new();
        attrs.insert("name".into(), Attr::Str(roi.name.clone()));
        attrs.insert("side".into(), Attr::Str(roi.side.as_str().into()));
        if let Some(id) = roi.allen_id() {
            attrs.insert("AllenID".into(), Attr::Int(id));
        }
        attrs.insert("description".into(), Attr::Str(roi.description.clone()));

        let mut e = ZlibEncoder::new(Vec::with_capacity(64), Compression::best());
        match roi.mask.as_slice() {
            Some(buf) => e.write_all(buf)?,
            None => e.write_all(&roi.mask.iter().copied().collect::<Vec<_>>())?,
        }
        Ok(Self {
            attrs,
            shape: roi.mask.dim(),
            zlib: e.finish()?,
        })
    }

    fn decompress(&self) -> MesoResult<Roi> {
        let (h, w) = self.shape;
        let len = h
            .checked_mul(w)
            .ok_or_else(|| MesoError::serial(format!("corrupted mask shape ({h}, {w})")))?;
        let mut buf = vec![];
        ZlibDecoder::new(self.zlib.as_slice())
            .take(len as u64 + 1)
            .read_to_end(&mut buf)
            .map_err(|e| MesoError::serial(format!("corrupted mask: {e}")))?;
        let mask = Array2::from_shape_vec((h, w), buf)
            .map_err(|e| MesoError::serial(format!("corrupted mask: {e}")))?;
        let side = str_attr(&self.attrs, "side")?
            .parse::<Hemisphere>()
            .map_err(|e| MesoError::serial(e.to_string()))?;
        Ok(Roi::new(
            str_attr(&self.attrs, "name")?,
            side,
            int_attr(&self.attrs, "AllenID")?.unwrap_or(-1),
            str_attr(&self.attrs, "description")?,
            mask,
        ))
    }
}

fn roi_path(roi: &Roi) -> String {
    match roi.side {
        Hemisphere::Both => roi.name.clone(),
        side => format!("{side}/{}", roi.name),
    }
}

impl Document {
    fn from_set(set: &RoiSet) -> MesoResult<Self> {
        let mut root = Group::default();
        root.attrs.insert("image_name".into(), Attr::Str(set.image_name().into()));
        root.attrs.insert("frame_idx".into(), Attr::Int(set.frame_idx()));
        root.attrs.insert("total_frames".into(), Attr::Int(set.total_frames()));

        let mut rois = Group::default();
        rois.attrs.insert(
            "names".into(),
            Attr::StrList(set.names().into_iter().map(String::from).collect()),
        );
        rois.attrs.insert(
            "order".into(),
            Attr::StrList(set.iter().map(roi_path).collect()),
        );
        let mut left = Group::default();
        let mut right = Group::default();
        for roi in set.iter() {
            let data = (roi.name.clone(), Entry::Dataset(Dataset::compress(roi)?));
            match roi.side {
                Hemisphere::Both => rois.children.push(data),
                Hemisphere::Left => left.children.push(data),
                Hemisphere::Right => right.children.push(data),
            }
        }
        for (side, group) in [(Hemisphere::Left, left), (Hemisphere::Right, right)] {
            if !group.children.is_empty() {
                rois.children.push((side.as_str().to_owned(), Entry::Group(group)));
            }
        }
        root.children.push((ROIS_GROUP.to_owned(), Entry::Group(rois)));
        Ok(Self {
            version: CONTAINER_VERSION,
            root,
        })
    }

    fn into_set(self) -> MesoResult<RoiSet> {
        if self.version != CONTAINER_VERSION {
            return Err(MesoError::serial(format!(
                "unsupported container version {} (expected {CONTAINER_VERSION})",
                self.version
            )));
        }
        let attrs = &self.root.attrs;
        let image_name = str_attr(attrs, "image_name")?.to_owned();
        let frame_idx = required_int(attrs, "frame_idx")?;
        let total_frames = required_int(attrs, "total_frames")?;

        let rois = match self.root.child(ROIS_GROUP) {
            Some(Entry::Group(g)) => g,
            _ => return Err(MesoError::serial("missing `rois` group")),
        };
        let rois = list_attr(&rois.attrs, "order")?
            .iter()
            .map(|path| rois.dataset(path)?.decompress())
            .collect::<MesoResult<Vec<_>>>()?;
        RoiSet::new(image_name, frame_idx, total_frames, rois)
            .map_err(|e| MesoError::serial(e.to_string()))
    }
}

impl RoiSet {
    /// 以容器格式写入 `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> MesoResult<()> {
        let doc = Document::from_set(self)?;
        writer.write_all(MAGIC)?;
        codec(u64::MAX)
            .serialize_into(&mut writer, &doc)
            .map_err(|e| MesoError::serial(format!("cannot encode ROI container: {e}")))?;
        writer.flush()?;
        Ok(())
    }

    /// 从 `reader` 读取容器格式.
    ///
    /// 格式错误、版本不符或身份属性缺失时返回 `Serialization` 错误.
    pub fn read_from<R: Read>(reader: R) -> MesoResult<Self> {
        Self::read_limited(reader, MAX_DOCUMENT_BYTES)
    }

    /// 节点树编码超过 `limit` 字节时返回 `Serialization` 错误, 不会按损坏的长度前缀分配内存.
    fn read_limited<R: Read>(mut reader: R, limit: u64) -> MesoResult<Self> {
        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|_| MesoError::serial("truncated ROI container"))?;
        if &magic != MAGIC {
            return Err(MesoError::serial("not an ROI container"));
        }
        let doc: Document = codec(limit)
            .deserialize_from(reader)
            .map_err(|e| MesoError::serial(format!("cannot decode ROI container: {e}")))?;
        doc.into_set()
    }

    /// 保存到 `path`, 必要时创建父目录.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> MesoResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.write_to(BufWriter::new(File::create(path)?))
    }

    /// 从 `path` 读取.
    pub fn load<P: AsRef<Path>>(path: P) -> MesoResult<Self> {
        let file = File::open(path)?;
        let limit = file.metadata()?.len().min(MAX_DOCUMENT_BYTES);
        Self::read_limited(BufReader::new(file), limit)
    }
}
