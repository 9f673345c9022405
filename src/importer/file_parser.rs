// ==========================================
// ICP 分析质控系统 - 行解码器
// ==========================================
// 职责: 外部文件 → 表头键控的原始行
// 支持: CSV (.csv)；其他格式由调用方实现 RowDecoder 接入
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// 原始行（表头 → 单元格文本，已 trim）
pub type RawRow = HashMap<String, String>;

// ==========================================
// RowDecoder Trait
// ==========================================
// 用途: 文件解码接口（导入阶段 0）
// 实现者: CsvRowDecoder
pub trait RowDecoder: Send + Sync {
    /// 解码文件为原始行（跳过完全空白的行）
    fn decode(&self, file_path: &Path) -> ImportResult<Vec<RawRow>>;
}

// ==========================================
// CsvRowDecoder 实现
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvRowDecoder;

impl RowDecoder for CsvRowDecoder {
    fn decode(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        // 检查文件存在
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        // 检查扩展名
        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 读取表头（去除 UTF-8 BOM）
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row = RawRow::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row.values().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(row);
        }

        Ok(rows)
    }
}
