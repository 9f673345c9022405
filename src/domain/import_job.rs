// ==========================================
// ICP 分析质控系统 - 导入任务领域模型
// ==========================================
// 所有权: 仅由 ImportJobTracker 持有并修改
// 调用方通过 job_id 引用，拿到的只是快照
// ==========================================

use crate::domain::types::ImportJobState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 导入任务（可变记录）
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub job_id: String,
    pub state: ImportJobState,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub percent: f64,
    pub message: Option<String>,
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ImportJob {
    pub fn new(job_id: String, total_rows: usize) -> Self {
        Self {
            job_id,
            state: ImportJobState::Pending,
            total_rows,
            processed_rows: 0,
            percent: 0.0,
            message: None,
            project_id: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// 由行数重算进度（total_rows=0 时为 0）
    pub fn recompute_percent(&mut self) {
        self.percent = if self.total_rows == 0 {
            0.0
        } else {
            (self.processed_rows as f64 / self.total_rows as f64 * 100.0).clamp(0.0, 100.0)
        };
    }

    pub fn snapshot(&self) -> ImportJobStatus {
        ImportJobStatus {
            job_id: self.job_id.clone(),
            state: self.state,
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            percent: self.percent,
            message: self.message.clone(),
            project_id: self.project_id.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// 导入任务只读快照（供轮询）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJobStatus {
    pub job_id: String,
    pub state: ImportJobState,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub percent: f64,
    pub message: Option<String>,
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
