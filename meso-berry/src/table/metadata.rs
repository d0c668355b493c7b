//! 每帧元数据表格: `Image, Frame, Width, Height, TotalFrames`.

use super::{ensure_parent, write_record, CsvTable};
use crate::roi::FrameMeta;
use crate::MesoResult;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const HEADER: [&str; 5] = ["Image", "Frame", "Width", "Height", "TotalFrames"];

/// 读取元数据表格. 缺少列或数值非法时返回 `Serialization` 错误.
pub fn read_metadata<R: BufRead>(reader: R) -> MesoResult<Vec<FrameMeta>> {
    let table = CsvTable::read(reader)?;
    let [image, frame, width, height, total] = [
        table.column(HEADER[0])?,
        table.column(HEADER[1])?,
        table.column(HEADER[2])?,
        table.column(HEADER[3])?,
        table.column(HEADER[4])?,
    ];
    table
        .rows()
        .iter()
        .map(|row| -> MesoResult<FrameMeta> {
            Ok(FrameMeta {
                image_name: row[image].clone(),
                frame_idx: table.parse(row, frame)?,
                width: table.parse(row, width)?,
                height: table.parse(row, height)?,
                total_frames: table.parse(row, total)?,
            })
        })
        .collect()
}

/// 写出元数据表格.
pub fn write_metadata<W: Write>(mut writer: W, metas: &[FrameMeta]) -> MesoResult<()> {
    write_record(&mut writer, HEADER)?;
    for m in metas {
        write_record(
            &mut writer,
            [
                m.image_name.clone(),
                m.frame_idx.to_string(),
                m.width.to_string(),
                m.height.to_string(),
                m.total_frames.to_string(),
            ],
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// 从 `path` 读取元数据表格.
pub fn load_metadata_table<P: AsRef<Path>>(path: P) -> MesoResult<Vec<FrameMeta>> {
    read_metadata(BufReader::new(File::open(path)?))
}

/// 保存元数据表格到 `path`, 必要时创建父目录.
pub fn save_metadata_table<P: AsRef<Path>>(path: P, metas: &[FrameMeta]) -> MesoResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    write_metadata(BufWriter::new(File::create(path)?), metas)
}
