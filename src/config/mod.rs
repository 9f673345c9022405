// ==========================================
// ICP 分析质控系统 - 配置层
// ==========================================
// 职责: 全局质控参数管理（阈值/并发/检出限）
// 说明: 项目级阈值来自 ProjectSettings，不在此处
// ==========================================

pub mod config_manager;
pub mod qc_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use qc_config_trait::{ConfigError, ConfigResult, QcConfigReader};
