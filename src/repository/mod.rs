// ==========================================
// ICP 分析质控系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 定义外部存储协作方接口，屏蔽持久化细节
// ==========================================

pub mod curve_store;
pub mod error;
pub mod sample_store;

// 重导出核心仓储
pub use curve_store::{CurveStore, InMemoryCurveStore};
pub use error::{RepositoryError, RepositoryResult};
pub use sample_store::{InMemorySampleStore, SampleStore};
