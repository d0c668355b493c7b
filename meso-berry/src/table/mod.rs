//! 表格 (CSV) 形式的持久化, 以及输出文件命名.
//!
//! 所有表格均为带单行表头的 CSV, 列按表头名字查找, 因此列的顺序不重要.

mod alignment;
mod landmarks;
mod metadata;

pub use alignment::{load_alignment_table, read_alignments, save_alignment_table, write_alignments};
pub use landmarks::{load_detection_table, read_detections, save_landmark_table, write_landmarks};
pub use metadata::{load_metadata_table, read_metadata, save_metadata_table, write_metadata};

use crate::roi::{RoiFileType, RoiSet};
use crate::{MesoError, MesoResult};
use std::borrow::Cow;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 帧序号至少补零到的位数.
const MIN_DIGITS: usize = 2;

/// 表示 `total` 个帧序号需要的位数, 至少为 2.
pub fn required_digits(total: i64) -> usize {
    let mut digits = 1;
    let mut rest = total.max(0) / 10;
    while rest > 0 {
        digits += 1;
        rest /= 10;
    }
    digits.max(MIN_DIGITS)
}

/// ROI 文件名 (不含后缀).
///
/// 单帧图像直接使用图像名; 否则为 `{图像名去掉扩展名}_frame{补零后的帧序号}`.
pub fn roi_file_stem(set: &RoiSet) -> String {
    if set.total_frames() == 1 {
        return set.image_name().to_owned();
    }
    let name = Path::new(set.image_name());
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or(Cow::Borrowed(set.image_name()));
    let width = required_digits(set.total_frames());
    format!("{stem}_frame{:0width$}", set.frame_idx())
}

/// `dir` 下保存 `set` 的文件路径.
pub fn roi_file_path<P: AsRef<Path>>(dir: P, set: &RoiSet, filetype: RoiFileType) -> PathBuf {
    dir.as_ref()
        .join(format!("{}{}", roi_file_stem(set), filetype.suffix()))
}

/// 带表头的 CSV 表格.
#[derive(Debug, Default)]
pub(crate) struct CsvTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// 读取表格. 空行被忽略; 带引号的字段可以跨行; 字段数与表头不一致时返回
    /// `Serialization` 错误.
    pub(crate) fn read<R: BufRead>(mut reader: R) -> MesoResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut records = split_records(text.trim_start_matches('\u{feff}'))?.into_iter();
        let (_, header) = records
            .next()
            .ok_or_else(|| MesoError::serial("table is empty"))?;
        let mut rows = vec![];
        for (lineno, row) in records {
            if row.len() != header.len() {
                return Err(MesoError::serial(format!(
                    "line {lineno}: expected {} fields, got {}",
                    header.len(),
                    row.len()
                )));
            }
            rows.push(row);
        }
        Ok(Self { header, rows })
    }

    /// 列名为 `name` 的列下标.
    pub(crate) fn column(&self, name: &str) -> MesoResult<usize> {
        self.header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| MesoError::serial(format!("missing column `{name}`")))
    }

    #[inline]
    pub(crate) fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// 解析 `row` 的第 `col` 个字段.
    pub(crate) fn parse<T: FromStr>(&self, row: &[String], col: usize) -> MesoResult<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw = row[col].trim();
        raw.parse::<T>().map_err(|e| {
            MesoError::serial(format!(
                "column `{}`: cannot parse `{raw}`: {e}",
                self.header[col]
            ))
        })
    }
}

/// 拆分 CSV 文本为记录, 每条记录附带其起始行号 (从 1 开始).
///
/// 支持双引号包裹的字段, `""` 转义, 以及引号内的换行. 行尾的 `\r\n` 视同 `\n`,
/// 只含空白的行被忽略.
pub(crate) fn split_records(text: &str) -> MesoResult<Vec<(usize, Vec<String>)>> {
    let mut records = vec![];
    let mut fields = vec![];
    let mut cur = String::new();
    let mut quoted = false;
    let mut had_quote = false;
    let mut line = 1;
    let mut start = 1;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                cur.push('"');
                chars.next();
            }
            (true, '"') => quoted = false,
            (false, '"') if cur.is_empty() => {
                quoted = true;
                had_quote = true;
            }
            (false, ',') => fields.push(std::mem::take(&mut cur)),
            (false, '\r') if chars.peek() == Some(&'\n') => {}
            (false, '\n') => {
                fields.push(std::mem::take(&mut cur));
                push_record(&mut records, start, std::mem::take(&mut fields), had_quote);
                had_quote = false;
                line += 1;
                start = line;
            }
            (true, '\n') => {
                cur.push(c);
                line += 1;
            }
            (_, c) => cur.push(c),
        }
    }
    if quoted {
        return Err(MesoError::serial(format!(
            "line {start}: unterminated quote"
        )));
    }
    if !cur.is_empty() || !fields.is_empty() || had_quote {
        fields.push(cur);
        push_record(&mut records, start, fields, had_quote);
    }
    Ok(records)
}

fn push_record(
    records: &mut Vec<(usize, Vec<String>)>,
    lineno: usize,
    fields: Vec<String>,
    had_quote: bool,
) {
    let blank = !had_quote && fields.len() == 1 && fields[0].trim().is_empty();
    if !blank {
        records.push((lineno, fields));
    }
}

/// 必要时给字段加上双引号.
pub(crate) fn quote(field: &str) -> Cow<'_, str> {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// 写出一行 CSV.
pub(crate) fn write_record<W, I, S>(writer: &mut W, fields: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut first = true;
    for f in fields {
        if !first {
            writer.write_all(b",")?;
        }
        first = false;
        writer.write_all(quote(f.as_ref()).as_bytes())?;
    }
    writeln!(writer)
}

/// 创建 `path` 的父目录.
pub(crate) fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{quote, required_digits, roi_file_path, roi_file_stem, split_records, CsvTable};
    use crate::roi::{RoiFileType, RoiSet};

    #[test]
    fn test_required_digits() {
        assert_eq!(required_digits(1), 2);
        assert_eq!(required_digits(9), 2);
        assert_eq!(required_digits(100), 3);
        assert_eq!(required_digits(999), 3);
        assert_eq!(required_digits(1000), 4);
    }

    #[test]
    fn test_roi_file_stem() {
        let single = RoiSet::new("img001.png", 0, 1, vec![]).unwrap();
        assert_eq!(roi_file_stem(&single), "img001.png");

        let video = RoiSet::new("session/mouse01.mp4", 7, 1500, vec![]).unwrap();
        assert_eq!(roi_file_stem(&video), "mouse01_frame0007");
        assert_eq!(
            roi_file_path("out", &video, RoiFileType::Container),
            std::path::Path::new("out/mouse01_frame0007.roi")
        );

        let short = RoiSet::new("a.avi", 3, 12, vec![]).unwrap();
        assert_eq!(roi_file_stem(&short), "a_frame03");
    }

    fn fields(text: &str) -> Vec<Vec<String>> {
        split_records(text)
            .unwrap()
            .into_iter()
            .map(|(_, r)| r)
            .collect()
    }

    #[test]
    fn test_split_records() {
        assert_eq!(fields("a,b,,c"), [["a", "b", "", "c"]]);
        assert_eq!(
            fields("\"x, y\",\"say \"\"hi\"\"\",3\r\n"),
            [["x, y", "say \"hi\"", "3"]]
        );
        assert!(split_records("\"open,1").is_err());
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a,b"), "\"a,b\"");
    }

    #[test]
    fn test_split_records_multiline() {
        let text = "name,n\r\n\"two\nlines\",1\r\n\n\"\",2\n";
        let records = split_records(text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], (2, vec!["two\nlines".to_owned(), "1".to_owned()]));
        assert_eq!(records[2], (5, vec![String::new(), "2".to_owned()]));

        let err = split_records("a\n\"b\n\nc").unwrap_err().to_string();
        assert!(err.contains("line 2"), "{err}");
    }

    #[test]
    fn test_csv_table() {
        let src = "\u{feff}A,B\n1,2\n\n3,4\n";
        let t = CsvTable::read(src.as_bytes()).unwrap();
        assert_eq!(t.rows().len(), 2);
        let b = t.column("B").unwrap();
        assert_eq!(t.parse::<i64>(&t.rows()[1], b).unwrap(), 4);
        assert!(t.column("C").is_err());
        assert!(CsvTable::read("A,B\n1\n".as_bytes()).is_err());
        assert!(CsvTable::read("".as_bytes()).is_err());
    }
}
