// ==========================================
// ICP 分析质控系统 - 透视报表领域模型
// ==========================================
// 一行一个样品，一列一个元素
// 元素值为字符串，允许 "N/A" / "<LOD>" 哨兵
// ==========================================

use crate::domain::types::SampleType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 缺失值哨兵
pub const MISSING_MARKER: &str = "N/A";
/// 低于检出限哨兵
pub const BELOW_LOD_MARKER: &str = "<LOD>";

/// 单样品单元素结果（报表输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementResult {
    pub sample_id: String,
    pub element: String,
    pub concentration: f64,
}

/// 报表行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub sample_id: String,
    pub solution_label: String,
    #[serde(rename = "type")]
    pub sample_type: SampleType,
    pub weight: Option<f64>,
    pub volume: Option<f64>,
    pub dilution_factor: Option<f64>,
    pub element_values: HashMap<String, String>,
}

/// 透视报表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotReport {
    pub element_headers: Vec<String>,
    pub rows: Vec<PivotRow>,
}

impl PivotReport {
    /// 按表头顺序取某行的元素值
    pub fn row_values(&self, row: &PivotRow) -> Vec<String> {
        self.element_headers
            .iter()
            .map(|h| {
                row.element_values
                    .get(h)
                    .cloned()
                    .unwrap_or_else(|| MISSING_MARKER.to_string())
            })
            .collect()
    }
}
