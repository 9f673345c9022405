// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的内存仓储初始化、样品/曲线构造等功能
// ==========================================

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use icp_qc_pipeline::config::ConfigManager;
use icp_qc_pipeline::domain::{
    CalibrationCurve, CalibrationPoint, CurveKey, ElementReading, ProjectSettings, Sample,
    SampleType,
};
use icp_qc_pipeline::engine::{CalibrationEngine, QualityControlOrchestrator};
use icp_qc_pipeline::repository::{CurveStore, InMemoryCurveStore, InMemorySampleStore};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const PROJECT: &str = "P1";

pub type TestOrchestrator =
    QualityControlOrchestrator<InMemorySampleStore, InMemoryCurveStore, ConfigManager>;

/// 固定时间基准
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 20, 8, 0, 0).unwrap()
}

// ==========================================
// SampleBuilder - 样品构造器
// ==========================================
pub struct SampleBuilder {
    sample: Sample,
}

impl SampleBuilder {
    pub fn new(sample_id: &str, sequence_no: usize) -> Self {
        Self {
            sample: Sample {
                sample_id: sample_id.to_string(),
                project_id: PROJECT.to_string(),
                solution_label: sample_id.to_string(),
                sample_type: SampleType::Sample,
                weight: None,
                volume: None,
                dilution_factor: None,
                readings: Vec::new(),
                certified: BTreeMap::new(),
                measured_at: Some(t0() + Duration::minutes(sequence_no as i64)),
                sequence_no,
                corrected: BTreeMap::new(),
            },
        }
    }

    pub fn standard(mut self) -> Self {
        self.sample.sample_type = SampleType::Standard;
        self
    }

    pub fn blank(mut self) -> Self {
        self.sample.sample_type = SampleType::Blank;
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.sample.weight = Some(weight);
        self
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.sample.volume = Some(volume);
        self
    }

    pub fn dilution_factor(mut self, df: f64) -> Self {
        self.sample.dilution_factor = Some(df);
        self
    }

    pub fn reading(mut self, element: &str, intensity: f64) -> Self {
        self.sample.readings.push(ElementReading {
            element: element.to_string(),
            intensity,
        });
        self
    }

    pub fn certified(mut self, element: &str, value: f64) -> Self {
        self.sample.certified.insert(element.to_string(), value);
        self
    }

    pub fn at_minutes(mut self, minutes: i64) -> Self {
        self.sample.measured_at = Some(t0() + Duration::minutes(minutes));
        self
    }

    pub fn untimed(mut self) -> Self {
        self.sample.measured_at = None;
        self
    }

    pub fn build(self) -> Sample {
        self.sample
    }
}

// ==========================================
// 仓储初始化
// ==========================================

/// 创建内存仓储并注册测试项目
pub fn create_stores(
    settings: ProjectSettings,
) -> (Arc<InMemorySampleStore>, Arc<InMemoryCurveStore>, Arc<ConfigManager>) {
    let samples = Arc::new(InMemorySampleStore::new());
    samples
        .register_project(PROJECT, settings)
        .expect("Failed to register project");
    (
        samples,
        Arc::new(InMemoryCurveStore::new()),
        Arc::new(ConfigManager::new()),
    )
}

/// 创建编排器（共享同一组仓储）
pub fn create_orchestrator(
    samples: &Arc<InMemorySampleStore>,
    curves: &Arc<InMemoryCurveStore>,
    config: &Arc<ConfigManager>,
) -> TestOrchestrator {
    QualityControlOrchestrator::new(Arc::clone(samples), Arc::clone(curves), Arc::clone(config))
}

/// 线性曲线 浓度 = intensity * slope（三点精确拟合）
pub fn linear_curve(element: &str, slope: f64) -> CalibrationCurve {
    let points = vec![
        CalibrationPoint::new(0.0, 0.0),
        CalibrationPoint::new(100.0 * slope, 100.0),
        CalibrationPoint::new(500.0 * slope, 500.0),
    ];
    CalibrationEngine::new()
        .fit(&CurveKey::new(PROJECT, element), &points, t0())
        .expect("Failed to fit curve")
}

/// 保存生效曲线
pub async fn install_curve(curves: &InMemoryCurveStore, element: &str, slope: f64) {
    curves
        .save_curve(linear_curve(element, slope))
        .await
        .expect("Failed to save curve");
}

/// 写入临时 CSV 文件（保持返回值存活）
pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("Failed to create temp file");
    for line in lines {
        writeln!(file, "{}", line).expect("Failed to write csv");
    }
    file
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
