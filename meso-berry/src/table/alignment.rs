//! 配准表格: 每帧一行, 12 个矩阵分量加 `is_separate`.

use super::{ensure_parent, write_record, CsvTable};
use crate::affine::AffineTransform;
use crate::align::Alignment;
use crate::{MesoError, MesoResult};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const COMPONENTS: [&str; 6] = ["xx", "xy", "xc", "yx", "yy", "yc"];

const SEPARATE_COLUMN: &str = "is_separate";

fn header() -> Vec<String> {
    ["left", "right"]
        .iter()
        .flat_map(|side| COMPONENTS.iter().map(move |c| format!("{side}_{c}")))
        .chain(std::iter::once(SEPARATE_COLUMN.to_owned()))
        .collect()
}

fn parse_bool(raw: &str) -> MesoResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(MesoError::serial(format!(
            "column `{SEPARATE_COLUMN}`: `{other}` is not a boolean"
        ))),
    }
}

/// 写出配准表格.
///
/// 浮点数以最短的可精确往返形式输出, 布尔值写作 `True` / `False`.
pub fn write_alignments<W: Write>(mut writer: W, alignments: &[Alignment]) -> MesoResult<()> {
    write_record(&mut writer, header())?;
    for a in alignments {
        let fields = a
            .left()
            .components()
            .into_iter()
            .chain(a.right().components())
            .map(|v| v.to_string())
            .chain(std::iter::once(
                if a.is_separate() { "True" } else { "False" }.to_owned(),
            ));
        write_record(&mut writer, fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// 读取配准表格. 缺少列、数值非法或 `is_separate = False` 但两侧不一致时返回 `Serialization` 错误.
pub fn read_alignments<R: BufRead>(reader: R) -> MesoResult<Vec<Alignment>> {
    let table = CsvTable::read(reader)?;
    let cols = header()
        .iter()
        .map(|name| table.column(name))
        .collect::<MesoResult<Vec<_>>>()?;

    table
        .rows()
        .iter()
        .map(|row| {
            let mut v = [0.0; 12];
            for (slot, &col) in v.iter_mut().zip(cols.iter()) {
                *slot = table.parse::<f64>(row, col)?;
            }
            let separate = parse_bool(&row[cols[12]])?;
            let [a, b, c, d, e, f, g, h, i, j, k, l] = v;
            let left = AffineTransform::from_components([a, b, c, d, e, f]);
            let right = AffineTransform::from_components([g, h, i, j, k, l]);
            Alignment::from_parts(left, right, separate)
                .map_err(|e| MesoError::serial(e.to_string()))
        })
        .collect()
}

/// 保存配准表格到 `path`, 必要时创建父目录.
pub fn save_alignment_table<P: AsRef<Path>>(path: P, alignments: &[Alignment]) -> MesoResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    write_alignments(BufWriter::new(File::create(path)?), alignments)
}

/// 从 `path` 读取配准表格.
pub fn load_alignment_table<P: AsRef<Path>>(path: P) -> MesoResult<Vec<Alignment>> {
    read_alignments(BufReader::new(File::open(path)?))
}
