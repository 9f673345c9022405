// ==========================================
// ICP 分析质控系统 - 导入层错误
// ==========================================
// 行号约定: 表头为第 1 行，首条数据为第 2 行
// 取消单独建模，调用方据此区分“用户取消”与“导入失败”
// ==========================================

use crate::engine::EngineError;
use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 解码阶段 =====
    #[error("仪器导出文件不存在: {0}")]
    FileNotFound(String),

    #[error("不支持的导出格式: {0}（当前仅接入 .csv）")]
    UnsupportedFormat(String),

    #[error("读取导出文件失败: {0}")]
    FileReadError(String),

    #[error("CSV 解码失败: {0}")]
    CsvParseError(String),

    // ===== 行映射阶段 =====
    #[error("行 {row} 映射失败: {message}")]
    FieldMappingError { row: usize, message: String },

    #[error("行 {row} 字段 {field} 取值非法: {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    // ===== 任务控制 =====
    #[error("导入任务 {job_id} 已被取消")]
    Cancelled { job_id: String },

    // ===== 下游 =====
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

pub type ImportResult<T> = Result<T, ImportError>;
