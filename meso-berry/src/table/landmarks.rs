//! 标志点表格.
//!
//! 每帧一行, 每个标准标志点三列: `{id}_x`, `{id}_y`, `{id}_likelihood`, 其中 `id` 为小写编号
//! (如 `l1`, `m5`). 空字段视为 NaN.

use super::{ensure_parent, write_record, CsvTable};
use crate::landmark::{LandmarkId, LandmarkSet};
use crate::MesoResult;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const AXES: [&str; 3] = ["x", "y", "likelihood"];

fn column_name(id: LandmarkId, axis: &str) -> String {
    format!("{}_{axis}", id.id().to_ascii_lowercase())
}

fn header() -> Vec<String> {
    LandmarkId::ALL
        .iter()
        .flat_map(|&id| AXES.iter().map(move |a| column_name(id, a)))
        .collect()
}

/// 读取检测结果表格, 每行得到一个按标准顺序排列的 [`LandmarkSet`].
///
/// 缺少列或数值非法时返回 `Serialization` 错误.
pub fn read_detections<R: BufRead>(reader: R) -> MesoResult<Vec<LandmarkSet>> {
    let table = CsvTable::read(reader)?;
    let cols = header()
        .iter()
        .map(|name| table.column(name))
        .collect::<MesoResult<Vec<_>>>()?;

    let value = |row: &[String], col: usize| -> MesoResult<f64> {
        if row[col].trim().is_empty() {
            Ok(f64::NAN)
        } else {
            table.parse::<f64>(row, col)
        }
    };
    table
        .rows()
        .iter()
        .map(|row| {
            let xyp = cols
                .chunks(AXES.len())
                .map(|c| Ok((value(row, c[0])?, value(row, c[1])?, value(row, c[2])?)))
                .collect::<MesoResult<Vec<_>>>()?;
            LandmarkSet::from_detection(&xyp)
        })
        .collect()
}

/// 写出标志点表格. 某帧缺少的标志点写作空字段.
pub fn write_landmarks<W: Write>(mut writer: W, frames: &[LandmarkSet]) -> MesoResult<()> {
    write_record(&mut writer, header())?;
    for marks in frames {
        let fields = LandmarkId::ALL.iter().flat_map(|id| {
            match marks.get(id.name()) {
                Some(l) => [l.x, l.y, l.p].map(|v| {
                    if v.is_nan() {
                        String::new()
                    } else {
                        v.to_string()
                    }
                }),
                None => [String::new(), String::new(), String::new()],
            }
        });
        write_record(&mut writer, fields)?;
    }
    writer.flush()?;
    Ok(())
}

/// 从 `path` 读取检测结果表格.
pub fn load_detection_table<P: AsRef<Path>>(path: P) -> MesoResult<Vec<LandmarkSet>> {
    read_detections(BufReader::new(File::open(path)?))
}

/// 保存标志点表格到 `path`, 必要时创建父目录.
pub fn save_landmark_table<P: AsRef<Path>>(path: P, frames: &[LandmarkSet]) -> MesoResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    write_landmarks(BufWriter::new(File::create(path)?), frames)
}
