// ==========================================
// ICP 分析质控系统 - 样品领域模型
// ==========================================
// 用途: 导入层写入，校准/质控/漂移/报表只读
// 红线: 导入后不可变，唯一例外是附加校正浓度
// ==========================================

use crate::domain::types::SampleType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ElementReading - 单元素仪器读数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementReading {
    pub element: String, // 元素/谱线名称（如 Cu63）
    pub intensity: f64,  // 原始强度
}

// ==========================================
// Sample - 样品
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    // ===== 标识 =====
    pub sample_id: String,
    pub project_id: String,
    pub solution_label: String,
    pub sample_type: SampleType,

    // ===== 物理量 =====
    pub weight: Option<f64>,
    pub volume: Option<f64>,
    pub dilution_factor: Option<f64>,

    // ===== 仪器读数（按首次出现顺序）=====
    pub readings: Vec<ElementReading>,

    // ===== 参考物质认定值（仅 Standard）=====
    pub certified: BTreeMap<String, f64>,

    // ===== 时间位置 =====
    #[serde(default)]
    pub measured_at: Option<DateTime<Utc>>, // 仪器测量时间（导出文件无时间列时为空）
    pub sequence_no: usize,                 // 项目内进样顺序号

    // ===== 漂移校正结果（导入后唯一可附加字段）=====
    #[serde(default)]
    pub corrected: BTreeMap<String, CorrectedConcentration>,
}

impl Sample {
    /// 读取某元素在指定曲线下的校正浓度（曲线已被替换时返回 None）
    pub fn corrected_for(&self, element: &str, curve_id: &str) -> Option<f64> {
        self.corrected
            .get(element)
            .filter(|c| c.curve_id == curve_id)
            .map(|c| c.concentration)
    }

    /// 读取某元素强度
    pub fn intensity(&self, element: &str) -> Option<f64> {
        self.readings
            .iter()
            .find(|r| r.element == element)
            .map(|r| r.intensity)
    }

    /// 读取某元素认定值
    pub fn certified_value(&self, element: &str) -> Option<f64> {
        self.certified.get(element).copied()
    }

    /// 是否为参考物质
    pub fn is_reference(&self) -> bool {
        self.sample_type == SampleType::Standard
    }

    /// 元素列表（首次出现顺序）
    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.readings.iter().map(|r| r.element.as_str())
    }
}

// ==========================================
// ProjectSettings - 项目质控阈值
// ==========================================
// 外部提供，核心只读
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    pub min_volume: Option<f64>,
    pub max_volume: Option<f64>,
    pub min_dilution_factor: Option<f64>,
    pub max_dilution_factor: Option<f64>,
    /// 空样判定阈值（未设置时回退到全局配置）
    pub empty_threshold: Option<f64>,
    /// 导入完成后自动运行全量质控
    pub auto_quality_control: bool,
}

// ==========================================
// SampleCorrection - 单样品单元素漂移校正
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleCorrection {
    pub sample_id: String,
    pub element: String,
    pub raw_concentration: f64,
    pub drift_factor: f64,
    pub corrected_concentration: f64,
    /// 计算时使用的校准曲线
    pub curve_id: String,
}

// ==========================================
// CorrectedConcentration - 已附加的校正浓度
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedConcentration {
    pub concentration: f64,
    pub drift_factor: f64,
    pub curve_id: String,
}

impl From<&SampleCorrection> for CorrectedConcentration {
    fn from(correction: &SampleCorrection) -> Self {
        Self {
            concentration: correction.corrected_concentration,
            drift_factor: correction.drift_factor,
            curve_id: correction.curve_id.clone(),
        }
    }
}
