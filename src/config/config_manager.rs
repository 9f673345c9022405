// ==========================================
// ICP 分析质控系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: 内存键值表（可由 JSON 文件初始化）
// ==========================================

use crate::config::qc_config_trait::{ConfigError, ConfigResult, QcConfigReader};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Default, Clone)]
pub struct ConfigManager {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl ConfigManager {
    /// 创建空配置（全部使用默认值）
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已有键值表创建
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }

    /// 从 JSON 文件加载（顶层必须是对象，值可为字符串或数字）
    ///
    /// # 示例
    /// ```json
    /// { "max_concurrency": 8, "lod/Cu63": "0.002" }
    /// ```
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// 从 JSON 文本加载
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let parsed: Value =
            serde_json::from_str(raw).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let object = parsed
            .as_object()
            .ok_or_else(|| ConfigError::ReadError("配置文件顶层必须是 JSON 对象".to_string()))?;

        let mut values = HashMap::new();
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: key.clone(),
                        value: other.to_string(),
                        message: "仅支持字符串/数字/布尔值".to_string(),
                    })
                }
            };
            values.insert(key.clone(), text);
        }

        Ok(Self::from_map(values))
    }

    /// 读取配置值
    pub fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|e| ConfigError::ReadError(format!("锁获取失败: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    /// 写入配置值（覆写）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| ConfigError::ReadError(format!("锁获取失败: {}", e)))?;
        values.insert(key.to_string(), value.trim().to_string());
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式，键有序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let values = self
            .values
            .read()
            .map_err(|e| ConfigError::ReadError(format!("锁获取失败: {}", e)))?;
        let ordered: BTreeMap<&String, &String> = values.iter().collect();
        serde_json::to_string(&ordered).map_err(|e| ConfigError::ReadError(e.to_string()))
    }

    /// 读取并解析配置，缺失时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// 非负浮点配置
    fn get_non_negative(&self, key: &str, default: f64) -> ConfigResult<f64> {
        let value: f64 = self.get_parsed_or_default(key, default)?;
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                message: "必须为非负有限数".to_string(),
            });
        }
        Ok(value)
    }

    /// 正整数配置
    fn get_positive_usize(&self, key: &str, default: usize) -> ConfigResult<usize> {
        let value: usize = self.get_parsed_or_default(key, default)?;
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: "0".to_string(),
                message: "必须大于 0".to_string(),
            });
        }
        Ok(value)
    }
}

// ==========================================
// QcConfigReader Trait 实现
// ==========================================
#[async_trait]
impl QcConfigReader for ConfigManager {
    async fn get_max_concurrency(&self) -> ConfigResult<usize> {
        self.get_positive_usize(config_keys::MAX_CONCURRENCY, 4)
    }

    async fn get_crm_fail_tolerance(&self) -> ConfigResult<f64> {
        self.get_non_negative(config_keys::CRM_FAIL_TOLERANCE, 0.10)
    }

    async fn get_crm_warning_tolerance(&self) -> ConfigResult<f64> {
        self.get_non_negative(config_keys::CRM_WARNING_TOLERANCE, 0.05)
    }

    async fn get_drift_factor_threshold(&self) -> ConfigResult<f64> {
        self.get_non_negative(config_keys::DRIFT_FACTOR_THRESHOLD, 0.10)
    }

    async fn get_empty_epsilon(&self) -> ConfigResult<f64> {
        self.get_non_negative(config_keys::EMPTY_EPSILON, 1e-6)
    }

    async fn get_lod(&self, element: &str) -> ConfigResult<f64> {
        let default_lod = self.get_non_negative(config_keys::DEFAULT_LOD, 0.0)?;
        let key = format!("{}{}", config_keys::LOD_PREFIX, element);
        self.get_non_negative(&key, default_lod)
    }

    async fn get_report_decimals(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(config_keys::REPORT_DECIMALS, 4)
    }

    async fn get_import_progress_batch_size(&self) -> ConfigResult<usize> {
        self.get_positive_usize(config_keys::IMPORT_PROGRESS_BATCH_SIZE, 50)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 并发
    pub const MAX_CONCURRENCY: &str = "max_concurrency";

    // CRM 检查
    pub const CRM_FAIL_TOLERANCE: &str = "crm_fail_tolerance";
    pub const CRM_WARNING_TOLERANCE: &str = "crm_warning_tolerance";

    // 漂移
    pub const DRIFT_FACTOR_THRESHOLD: &str = "drift_factor_threshold";

    // 空样
    pub const EMPTY_EPSILON: &str = "empty_epsilon";

    // 检出限（单元素键: lod/<element>）
    pub const DEFAULT_LOD: &str = "default_lod";
    pub const LOD_PREFIX: &str = "lod/";

    // 报表
    pub const REPORT_DECIMALS: &str = "report_decimals";

    // 导入
    pub const IMPORT_PROGRESS_BATCH_SIZE: &str = "import_progress_batch_size";
}
