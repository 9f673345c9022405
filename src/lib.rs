// ==========================================
// ICP 分析质控系统 - 核心库
// ==========================================
// 流程: 导入 → 校准 → 质控规则 → 漂移校正 → 汇总/透视报表
// 系统定位: 分析数据质控核心（表示层与持久化由调用方提供）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 存储协作方接口
pub mod repository;

// 引擎层 - 校准/质控/漂移/报表
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 全局质控参数
pub mod config;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CheckStatus, CheckType, ImportJobState, SampleType};

// 领域实体
pub use domain::{
    CalibrationCurve, CalibrationPoint, DriftCorrectionResult, ImportJobStatus, PivotReport,
    ProjectQualitySummary, ProjectSettings, QualityCheckResult, Sample,
};

// 引擎
pub use engine::{
    CalibrationEngine, DriftCorrector, ElementOrder, ImportJobTracker, PivotReportBuilder,
    QualityControlOrchestrator,
};

// 仓储
pub use repository::{CurveStore, InMemoryCurveStore, InMemorySampleStore, SampleStore};

// 配置
pub use config::{ConfigManager, QcConfigReader};

// API
pub use api::{ApiError, ApiResult, QcApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "ICP 分析质控系统";
