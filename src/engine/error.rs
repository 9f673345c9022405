// ==========================================
// ICP 分析质控系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 每个错误必须携带定位上下文（项目/元素/样品/任务）
// ==========================================

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 状态机错误 =====
    #[error("无效的状态转换: job_id={job_id}, state={state}, action={action}")]
    InvalidState {
        job_id: String,
        state: String,
        action: String,
    },

    #[error("资源未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ===== 校准错误 =====
    #[error("校准点不足: project={project_id}, element={element}, 可用点={usable}（至少 2 个）")]
    InsufficientData {
        project_id: String,
        element: String,
        usable: usize,
    },

    #[error("校准退化: project={project_id}, element={element}, 强度无方差")]
    DegenerateFit { project_id: String, element: String },

    #[error("校准曲线未生效: curve_id={curve_id}, element={element}")]
    InactiveCurve { curve_id: String, element: String },

    // ===== 漂移错误（非致命，降级为直通）=====
    #[error("缺少参考数据: project={project_id}, element={element}")]
    NoReferenceData { project_id: String, element: String },

    // ===== 下游错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// 是否只影响单个元素（不应中断整轮质控）
    pub fn is_element_scoped(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. }
                | EngineError::DegenerateFit { .. }
                | EngineError::InactiveCurve { .. }
                | EngineError::NoReferenceData { .. }
        )
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
