// ==========================================
// ICP 分析质控系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供表示层（桌面/服务端）调用
// ==========================================

pub mod error;
pub mod qc_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use qc_api::QcApi;
