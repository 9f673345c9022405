// ==========================================
// ICP 分析质控系统 - API层错误类型
// ==========================================
// 职责: 把仓储/引擎/导入错误转换为面向表示层的错误
// 红线: 所有错误信息必须包含显式原因（项目/元素/任务/行号）
// ==========================================

use crate::engine::EngineError;
use crate::importer::ImportError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: job_id={job_id}, state={state}, action={action}")]
    InvalidStateTransition {
        job_id: String,
        state: String,
        action: String,
    },

    // ==========================================
    // 校准错误（单元素）
    // ==========================================
    #[error("校准失败: {0}")]
    CalibrationError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("导入已取消: job_id={0}")]
    ImportCancelled(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("存储错误: {0}")]
    StorageError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::AlreadyExists { entity, id } => {
                ApiError::ValidationError(format!("{}(id={})已存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::StorageError(format!("存储锁获取失败: {}", msg))
            }
            RepositoryError::WriteError(msg) => ApiError::StorageError(msg),
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidState {
                job_id,
                state,
                action,
            } => ApiError::InvalidStateTransition {
                job_id,
                state,
                action,
            },
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            e @ (EngineError::InsufficientData { .. }
            | EngineError::DegenerateFit { .. }
            | EngineError::InactiveCurve { .. }
            | EngineError::NoReferenceData { .. }) => ApiError::CalibrationError(e.to_string()),
            EngineError::Repository(e) => e.into(),
            EngineError::Config(e) => ApiError::ConfigError(e.to_string()),
            EngineError::Internal(msg) => ApiError::InternalError(msg),
            EngineError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Cancelled { job_id } => ApiError::ImportCancelled(job_id),
            ImportError::Engine(e) => e.into(),
            ImportError::Repository(e) => e.into(),
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件 {}", path)),
            e @ (ImportError::FieldMappingError { .. }
            | ImportError::TypeConversionError { .. }) => ApiError::ValidationError(e.to_string()),
            ImportError::Other(err) => ApiError::Other(err),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
