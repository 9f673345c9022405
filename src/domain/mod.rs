// ==========================================
// ICP 分析质控系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod calibration;
pub mod import_job;
pub mod quality;
pub mod report;
pub mod sample;
pub mod types;

// 重导出核心类型
pub use calibration::{CalibrationCurve, CalibrationPoint, CurveKey};
pub use import_job::{ImportJob, ImportJobStatus};
pub use quality::{
    DriftCorrectionResult, ProjectQualitySummary, QualityCheckResult, StatusCounts,
};
pub use report::{ElementResult, PivotReport, PivotRow, BELOW_LOD_MARKER, MISSING_MARKER};
pub use sample::{
    CorrectedConcentration, ElementReading, ProjectSettings, Sample, SampleCorrection,
};
pub use types::{CheckStatus, CheckType, ImportJobState, SampleType};
