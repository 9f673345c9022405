// ==========================================
// ICP 分析质控系统 - 导入任务跟踪器
// ==========================================
// 状态机: Pending →(start) Running →(advance)* Running →(complete) Completed
//         Pending/Running →(fail/cancel) Failed
// 红线: Completed/Failed 为终态；同一任务单写者（每任务一把锁），不同任务互不影响
// ==========================================

use crate::domain::import_job::{ImportJob, ImportJobStatus};
use crate::domain::types::ImportJobState;
use crate::engine::error::{EngineError, EngineResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 取消时记录的消息
pub const CANCELLED_MESSAGE: &str = "cancelled";

// ==========================================
// ImportJobTracker - 导入任务跟踪器
// ==========================================
#[derive(Debug, Default, Clone)]
pub struct ImportJobTracker {
    jobs: Arc<RwLock<HashMap<String, Arc<Mutex<ImportJob>>>>>,
}

impl ImportJobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建任务（state=Pending, processed_rows=0）
    pub fn create(&self, total_rows: usize) -> EngineResult<String> {
        let job_id = Uuid::new_v4().to_string();
        let job = ImportJob::new(job_id.clone(), total_rows);

        let mut jobs = self
            .jobs
            .write()
            .map_err(|e| EngineError::Internal(format!("任务表锁获取失败: {}", e)))?;
        jobs.insert(job_id.clone(), Arc::new(Mutex::new(job)));

        info!(job_id = %job_id, total_rows, "导入任务已创建");
        Ok(job_id)
    }

    /// Pending → Running
    pub fn start(&self, job_id: &str) -> EngineResult<ImportJobStatus> {
        self.with_job(job_id, |job| {
            if job.state != ImportJobState::Pending {
                return Err(invalid_state(job, "start"));
            }
            job.state = ImportJobState::Running;
            job.started_at = Some(Utc::now());
            info!(job_id = %job.job_id, "导入任务开始");
            Ok(job.snapshot())
        })
    }

    /// 推进已处理行数（钳制到 total_rows），仅 Running 可调用
    pub fn advance(&self, job_id: &str, rows_processed_delta: usize) -> EngineResult<ImportJobStatus> {
        self.with_job(job_id, |job| {
            if job.state != ImportJobState::Running {
                return Err(invalid_state(job, "advance"));
            }
            job.processed_rows = job
                .processed_rows
                .saturating_add(rows_processed_delta)
                .min(job.total_rows);
            job.recompute_percent();
            debug!(
                job_id = %job.job_id,
                processed_rows = job.processed_rows,
                percent = job.percent,
                "导入进度推进"
            );
            Ok(job.snapshot())
        })
    }

    /// Running → Completed（完成时进度强制为 100）
    pub fn complete(&self, job_id: &str, project_id: &str) -> EngineResult<ImportJobStatus> {
        self.with_job(job_id, |job| {
            if job.state != ImportJobState::Running {
                return Err(invalid_state(job, "complete"));
            }
            job.state = ImportJobState::Completed;
            job.percent = 100.0;
            job.project_id = Some(project_id.to_string());
            job.finished_at = Some(Utc::now());
            info!(
                job_id = %job.job_id,
                project_id = %project_id,
                processed_rows = job.processed_rows,
                "导入任务完成"
            );
            Ok(job.snapshot())
        })
    }

    /// 非终态 → Failed；已 Failed 时幂等（保留首次消息）
    pub fn fail(&self, job_id: &str, message: &str) -> EngineResult<ImportJobStatus> {
        self.with_job(job_id, |job| match job.state {
            ImportJobState::Failed => Ok(job.snapshot()),
            ImportJobState::Completed => Err(invalid_state(job, "fail")),
            ImportJobState::Pending | ImportJobState::Running => {
                job.state = ImportJobState::Failed;
                job.message = Some(message.to_string());
                job.finished_at = Some(Utc::now());
                warn!(
                    job_id = %job.job_id,
                    processed_rows = job.processed_rows,
                    message = %message,
                    "导入任务失败"
                );
                Ok(job.snapshot())
            }
        })
    }

    /// 取消（Failed + "cancelled"），已处理行不回滚
    pub fn cancel(&self, job_id: &str) -> EngineResult<ImportJobStatus> {
        self.fail(job_id, CANCELLED_MESSAGE)
    }

    /// 只读快照
    pub fn status(&self, job_id: &str) -> EngineResult<ImportJobStatus> {
        self.with_job(job_id, |job| Ok(job.snapshot()))
    }

    /// 全部任务快照（按创建时间）
    pub fn list(&self) -> EngineResult<Vec<ImportJobStatus>> {
        let handles: Vec<Arc<Mutex<ImportJob>>> = {
            let jobs = self
                .jobs
                .read()
                .map_err(|e| EngineError::Internal(format!("任务表锁获取失败: {}", e)))?;
            jobs.values().cloned().collect()
        };

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            let job = handle
                .lock()
                .map_err(|e| EngineError::Internal(format!("任务锁获取失败: {}", e)))?;
            snapshots.push(job.snapshot());
        }
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(snapshots)
    }

    fn job_handle(&self, job_id: &str) -> EngineResult<Arc<Mutex<ImportJob>>> {
        let jobs = self
            .jobs
            .read()
            .map_err(|e| EngineError::Internal(format!("任务表锁获取失败: {}", e)))?;
        let handle = jobs.get(job_id).cloned();
        handle.ok_or_else(|| EngineError::NotFound {
            entity: "ImportJob".to_string(),
            id: job_id.to_string(),
        })
    }

    /// 持有单任务锁执行一次转移
    fn with_job<T>(
        &self,
        job_id: &str,
        f: impl FnOnce(&mut ImportJob) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let handle = self.job_handle(job_id)?;
        let mut job = handle
            .lock()
            .map_err(|e| EngineError::Internal(format!("任务锁获取失败: {}", e)))?;
        f(&mut *job)
    }
}

fn invalid_state(job: &ImportJob, action: &str) -> EngineError {
    EngineError::InvalidState {
        job_id: job.job_id.clone(),
        state: job.state.to_string(),
        action: action.to_string(),
    }
}
