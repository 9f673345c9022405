// ==========================================
// ICP 分析质控系统 - 透视报表构建器
// ==========================================
// 列: 全部样品出现过的元素并集，按调用方指定的稳定顺序
// 行: 保持样品导入顺序
// 缺失 → "N/A"，低于检出限 → "<LOD>"
// ==========================================

use crate::domain::report::{
    ElementResult, PivotReport, PivotRow, BELOW_LOD_MARKER, MISSING_MARKER,
};
use crate::domain::sample::Sample;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 元素列排序方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ElementOrder {
    /// 首次出现顺序
    #[default]
    FirstSeen,
    /// 字母序
    Alphabetical,
    /// 指定顺序在前，其余按首次出现追加
    Custom(Vec<String>),
}

/// 报表选项
#[derive(Debug, Clone, PartialEq)]
pub struct PivotOptions {
    pub order: ElementOrder,
    pub decimals: usize,
    /// 元素检出限（未列出的元素使用 default_lod）
    pub lod: HashMap<String, f64>,
    pub default_lod: f64,
}

impl Default for PivotOptions {
    fn default() -> Self {
        Self {
            order: ElementOrder::FirstSeen,
            decimals: 4,
            lod: HashMap::new(),
            default_lod: 0.0,
        }
    }
}

impl PivotOptions {
    fn lod_for(&self, element: &str) -> f64 {
        self.lod.get(element).copied().unwrap_or(self.default_lod)
    }
}

// ==========================================
// PivotReportBuilder
// ==========================================
#[derive(Debug, Default, Clone)]
pub struct PivotReportBuilder {
    options: PivotOptions,
}

impl PivotReportBuilder {
    pub fn new(options: PivotOptions) -> Self {
        Self { options }
    }

    pub fn build(&self, samples: &[Sample], results: &[ElementResult]) -> PivotReport {
        let mut ordered: Vec<&Sample> = samples.iter().collect();
        ordered.sort_by_key(|s| s.sequence_no);

        let headers = self.element_headers(&ordered, results);

        let values: HashMap<(&str, &str), f64> = results
            .iter()
            .map(|r| ((r.sample_id.as_str(), r.element.as_str()), r.concentration))
            .collect();

        let rows = ordered
            .iter()
            .map(|sample| {
                let element_values = headers
                    .iter()
                    .map(|element| {
                        let cell = match values.get(&(sample.sample_id.as_str(), element.as_str())) {
                            Some(&value) => self.render(element, value),
                            None => MISSING_MARKER.to_string(),
                        };
                        (element.clone(), cell)
                    })
                    .collect();

                PivotRow {
                    sample_id: sample.sample_id.clone(),
                    solution_label: sample.solution_label.clone(),
                    sample_type: sample.sample_type,
                    weight: sample.weight,
                    volume: sample.volume,
                    dilution_factor: sample.dilution_factor,
                    element_values,
                }
            })
            .collect();

        PivotReport {
            element_headers: headers,
            rows,
        }
    }

    fn render(&self, element: &str, value: f64) -> String {
        if !value.is_finite() {
            return MISSING_MARKER.to_string();
        }
        let lod = self.options.lod_for(element);
        if lod > 0.0 && value < lod {
            return BELOW_LOD_MARKER.to_string();
        }
        format!("{:.*}", self.options.decimals, value)
    }

    fn element_headers(&self, samples: &[&Sample], results: &[ElementResult]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut first_seen: Vec<String> = Vec::new();

        let from_samples = samples.iter().flat_map(|s| s.elements());
        let from_results = results.iter().map(|r| r.element.as_str());
        for element in from_samples.chain(from_results) {
            if seen.insert(element.to_string()) {
                first_seen.push(element.to_string());
            }
        }

        match &self.options.order {
            ElementOrder::FirstSeen => first_seen,
            ElementOrder::Alphabetical => {
                first_seen.sort();
                first_seen
            }
            ElementOrder::Custom(preferred) => {
                let mut placed: HashSet<String> = HashSet::new();
                let mut headers: Vec<String> = preferred
                    .iter()
                    .filter(|e| seen.contains(e.as_str()) && placed.insert(e.to_string()))
                    .cloned()
                    .collect();
                headers.extend(first_seen.into_iter().filter(|e| !placed.contains(e)));
                headers
            }
        }
    }
}
