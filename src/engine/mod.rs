// ==========================================
// ICP 分析质控系统 - 引擎层
// ==========================================
// 职责: 校准拟合、质控规则、漂移校正、导入任务跟踪、透视报表
// 红线: 引擎不直接持有存储实现，只依赖仓储 trait
// ==========================================

pub mod calibration;
pub mod drift;
pub mod error;
pub mod import_tracker;
pub mod orchestrator;
pub mod pivot_report;
pub mod quality_rules;

// 重导出核心引擎
pub use calibration::{CalibrationEngine, LinearFit};
pub use drift::{DriftCheckpoint, DriftCorrector, DriftOutcome, TimeAxis};
pub use error::{EngineError, EngineResult};
pub use import_tracker::{ImportJobTracker, CANCELLED_MESSAGE};
pub use orchestrator::{CheckRunReport, QualityControlOrchestrator};
pub use pivot_report::{ElementOrder, PivotOptions, PivotReportBuilder};
pub use quality_rules::{CurveState, RuleContext, RuleFn, RuleThresholds};
