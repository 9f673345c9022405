// ==========================================
// ICP 分析质控系统 - 质控配置读取 Trait
// ==========================================
// 职责: 定义引擎层所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use thiserror::Error;

/// 配置读取错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("配置读取失败: {0}")]
    ReadError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// QcConfigReader Trait
// ==========================================
// 实现者: ConfigManager（键值存储）
#[async_trait]
pub trait QcConfigReader: Send + Sync {
    // ===== 并发 =====

    /// 单样品检查并发上限
    ///
    /// # 默认值
    /// - 4
    async fn get_max_concurrency(&self) -> ConfigResult<usize>;

    // ===== CRM 检查 =====

    /// CRM 相对偏差失败阈值
    ///
    /// # 默认值
    /// - 0.10
    async fn get_crm_fail_tolerance(&self) -> ConfigResult<f64>;

    /// CRM 相对偏差警告阈值（窄带）
    ///
    /// # 默认值
    /// - 0.05
    async fn get_crm_warning_tolerance(&self) -> ConfigResult<f64>;

    // ===== 漂移 =====

    /// 漂移因子阈值（|factor - 1| 超过即失败）
    ///
    /// # 默认值
    /// - 0.10
    async fn get_drift_factor_threshold(&self) -> ConfigResult<f64>;

    // ===== 空样检查 =====

    /// 全局"近零"阈值（项目设置优先）
    ///
    /// # 默认值
    /// - 1e-6
    async fn get_empty_epsilon(&self) -> ConfigResult<f64>;

    // ===== 报表 =====

    /// 元素检出限（未单独配置时使用默认检出限）
    ///
    /// # 默认值
    /// - 0.0（不启用）
    async fn get_lod(&self, element: &str) -> ConfigResult<f64>;

    /// 报表小数位数
    ///
    /// # 默认值
    /// - 4
    async fn get_report_decimals(&self) -> ConfigResult<usize>;

    // ===== 导入 =====

    /// 每次进度推进的行数
    ///
    /// # 默认值
    /// - 50
    async fn get_import_progress_batch_size(&self) -> ConfigResult<usize>;
}
