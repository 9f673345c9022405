// ==========================================
// ICP 分析质控系统 - 样品导入器
// ==========================================
// 流程: 解码 → 分批映射(推进进度) → 聚合样品 → 落库 → 完成任务 → (可选)自动质控
// 取消: 每批之间检查任务状态，已取消则停止且不落库
// 红线: 映射失败 → 任务 Failed，消息带行号
// ==========================================

use crate::config::QcConfigReader;
use crate::domain::import_job::ImportJobStatus;
use crate::domain::types::ImportJobState;
use crate::engine::{EngineError, ImportJobTracker, QualityControlOrchestrator};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{SampleAssembler, SampleFieldMapper};
use crate::importer::file_parser::{RawRow, RowDecoder};
use crate::repository::{CurveStore, SampleStore};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 导入结果
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub job: ImportJobStatus,
    pub samples_imported: usize,
    /// 自动质控评估数（未开启时为 None）
    pub checks_evaluated: Option<usize>,
}

// ==========================================
// SampleImporter - 样品导入器
// ==========================================
pub struct SampleImporter<S: ?Sized, K: ?Sized, C>
where
    S: SampleStore,
    K: CurveStore,
    C: QcConfigReader,
{
    tracker: ImportJobTracker,
    store: Arc<S>,
    orchestrator: Arc<QualityControlOrchestrator<S, K, C>>,
    config: Arc<C>,
    mapper: SampleFieldMapper,
}

impl<S: ?Sized, K: ?Sized, C> SampleImporter<S, K, C>
where
    S: SampleStore,
    K: CurveStore,
    C: QcConfigReader,
{
    /// 创建新的 SampleImporter 实例
    ///
    /// # 参数
    /// - tracker: 导入任务跟踪器（与 API 层共享）
    /// - store: 样品仓储
    /// - orchestrator: 质控编排器（自动质控）
    /// - config: 配置读取器
    pub fn new(
        tracker: ImportJobTracker,
        store: Arc<S>,
        orchestrator: Arc<QualityControlOrchestrator<S, K, C>>,
        config: Arc<C>,
    ) -> Self {
        Self {
            tracker,
            store,
            orchestrator,
            config,
            mapper: SampleFieldMapper,
        }
    }

    /// 解码文件并导入（内部创建任务）
    pub async fn import_file(
        &self,
        decoder: &dyn RowDecoder,
        file_path: &Path,
        project_id: &str,
    ) -> ImportResult<ImportOutcome> {
        info!(file_path = %file_path.display(), project_id = %project_id, "开始解码导入文件");
        let rows = decoder.decode(file_path)?;
        let job_id = self.tracker.create(rows.len())?;
        self.import_rows(&job_id, project_id, rows).await
    }

    /// 导入已解码的行到指定任务（任务须为 Pending）
    pub async fn import_rows(
        &self,
        job_id: &str,
        project_id: &str,
        rows: Vec<RawRow>,
    ) -> ImportResult<ImportOutcome> {
        match self.run_import(job_id, project_id, rows).await {
            Ok(outcome) => Ok(outcome),
            Err(ImportError::Cancelled { job_id }) => {
                warn!(job_id = %job_id, project_id = %project_id, "导入已取消，样品未落库");
                Err(ImportError::Cancelled { job_id })
            }
            Err(e) => {
                error!(job_id = %job_id, project_id = %project_id, error = %e, "导入失败");
                if let Err(fail_err) = self.tracker.fail(job_id, &e.to_string()) {
                    // 任务已完成（自动质控阶段失败）时保持 Completed
                    debug!(job_id = %job_id, error = %fail_err, "任务状态未改为 Failed");
                }
                Err(e)
            }
        }
    }

    async fn run_import(
        &self,
        job_id: &str,
        project_id: &str,
        rows: Vec<RawRow>,
    ) -> ImportResult<ImportOutcome> {
        // ==========================================
        // 步骤1: 校验项目并启动任务
        // ==========================================
        let settings = self.store.get_settings(project_id).await?;
        let batch_size = self
            .config
            .get_import_progress_batch_size()
            .await
            .map_err(EngineError::from)?;

        self.ensure_not_cancelled(job_id)?;
        self.tracker.start(job_id)?;
        info!(
            job_id = %job_id,
            project_id = %project_id,
            rows = rows.len(),
            batch_size,
            "导入任务运行中"
        );

        // ==========================================
        // 步骤2: 分批映射 + 推进进度
        // ==========================================
        let mut assembler = SampleAssembler::new(project_id);
        for (batch_idx, chunk) in rows.chunks(batch_size).enumerate() {
            self.ensure_not_cancelled(job_id)?;

            let offset = batch_idx * batch_size;
            for (idx, row) in chunk.iter().enumerate() {
                // 表头为第 1 行
                let mapped = self.mapper.map_row(row, offset + idx + 2)?;
                assembler.push(mapped)?;
            }

            self.advance(job_id, chunk.len())?;
            tokio::task::yield_now().await;
        }
        self.ensure_not_cancelled(job_id)?;

        // ==========================================
        // 步骤3: 预留顺序号 + 落库
        // ==========================================
        // 顺序号在仓储内原子分配，同一项目并发导入不会撞号
        let offset = self
            .store
            .reserve_sequence(project_id, assembler.len())
            .await?;
        let samples = assembler.starting_at(offset).finish();
        let samples_imported = samples.len();
        self.store.save_samples(project_id, samples).await?;
        debug!(job_id = %job_id, project_id = %project_id, samples_imported, "样品已落库");

        // ==========================================
        // 步骤4: 完成任务
        // ==========================================
        let job = self.tracker.complete(job_id, project_id)?;

        // ==========================================
        // 步骤5: 自动质控
        // ==========================================
        let checks_evaluated = if settings.auto_quality_control {
            info!(project_id = %project_id, "项目开启自动质控，运行全部检查");
            Some(self.orchestrator.run_all_checks(project_id).await?)
        } else {
            None
        };

        Ok(ImportOutcome {
            job,
            samples_imported,
            checks_evaluated,
        })
    }

    fn ensure_not_cancelled(&self, job_id: &str) -> ImportResult<()> {
        let status = self.tracker.status(job_id)?;
        if status.state == ImportJobState::Failed {
            return Err(ImportError::Cancelled {
                job_id: job_id.to_string(),
            });
        }
        Ok(())
    }

    /// 推进进度；并发取消导致的状态冲突视为取消
    fn advance(&self, job_id: &str, rows: usize) -> ImportResult<()> {
        match self.tracker.advance(job_id, rows) {
            Ok(_) => Ok(()),
            Err(EngineError::InvalidState { .. }) => Err(ImportError::Cancelled {
                job_id: job_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
