// ==========================================
// ICP 分析质控系统 - 质控 API
// ==========================================
// 职责: 面向表示层的门面（导入任务 / 质控 / 漂移校正 / 曲线 / 报表）
// 寻址: 一律按 project_id / job_id，错误统一为 ApiError
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::QcConfigReader;
use crate::domain::calibration::CalibrationCurve;
use crate::domain::import_job::ImportJobStatus;
use crate::domain::quality::{DriftCorrectionResult, ProjectQualitySummary};
use crate::domain::report::PivotReport;
use crate::domain::types::CheckType;
use crate::engine::{
    CalibrationEngine, ElementOrder, EngineError, ImportJobTracker, PivotOptions,
    PivotReportBuilder, QualityControlOrchestrator,
};
use crate::importer::{CsvRowDecoder, ImportOutcome, RawRow, SampleImporter};
use crate::repository::{CurveStore, SampleStore};
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

// ==========================================
// QcApi - 质控 API
// ==========================================
pub struct QcApi<S: ?Sized, K: ?Sized, C>
where
    S: SampleStore,
    K: CurveStore,
    C: QcConfigReader,
{
    tracker: ImportJobTracker,
    curves: Arc<K>,
    config: Arc<C>,
    orchestrator: Arc<QualityControlOrchestrator<S, K, C>>,
    importer: SampleImporter<S, K, C>,
    calibration: CalibrationEngine,
}

impl<S: ?Sized, K: ?Sized, C> QcApi<S, K, C>
where
    S: SampleStore,
    K: CurveStore,
    C: QcConfigReader,
{
    /// 创建新的QcApi实例
    ///
    /// # 参数
    /// - samples: 样品仓储
    /// - curves: 校准曲线仓储
    /// - config: 配置读取器
    pub fn new(samples: Arc<S>, curves: Arc<K>, config: Arc<C>) -> Self {
        let tracker = ImportJobTracker::new();
        let orchestrator = Arc::new(QualityControlOrchestrator::new(
            Arc::clone(&samples),
            Arc::clone(&curves),
            Arc::clone(&config),
        ));
        let importer = SampleImporter::new(
            tracker.clone(),
            samples,
            Arc::clone(&orchestrator),
            Arc::clone(&config),
        );

        Self {
            tracker,
            curves,
            config,
            orchestrator,
            importer,
            calibration: CalibrationEngine::new(),
        }
    }

    // ==========================================
    // 导入任务
    // ==========================================

    /// 创建导入任务，返回 job_id
    pub fn create_import_job(&self, total_rows: usize) -> ApiResult<String> {
        Ok(self.tracker.create(total_rows)?)
    }

    /// 查询导入任务状态（轮询）
    pub fn get_import_status(&self, job_id: &str) -> ApiResult<ImportJobStatus> {
        Ok(self.tracker.status(job_id)?)
    }

    /// 全部导入任务
    pub fn list_import_jobs(&self) -> ApiResult<Vec<ImportJobStatus>> {
        Ok(self.tracker.list()?)
    }

    /// 取消导入任务
    pub fn cancel_import(&self, job_id: &str) -> ApiResult<ImportJobStatus> {
        Ok(self.tracker.cancel(job_id)?)
    }

    /// 导入已解码的行到已创建的任务
    pub async fn import_rows(
        &self,
        job_id: &str,
        project_id: &str,
        rows: Vec<RawRow>,
    ) -> ApiResult<ImportOutcome> {
        Ok(self.importer.import_rows(job_id, project_id, rows).await?)
    }

    /// 导入 CSV 文件（内部创建任务）
    pub async fn import_csv(&self, file_path: &Path, project_id: &str) -> ApiResult<ImportOutcome> {
        Ok(self
            .importer
            .import_file(&CsvRowDecoder, file_path, project_id)
            .await?)
    }

    // ==========================================
    // 质控
    // ==========================================

    /// 运行单个检查（检查类型名不区分大小写，如 "WeightCheck" / "crm_check"）
    pub async fn run_check(&self, project_id: &str, check_type: &str) -> ApiResult<usize> {
        let check_type = check_type
            .parse::<CheckType>()
            .map_err(ApiError::InvalidInput)?;
        Ok(self.orchestrator.run_check(project_id, check_type).await?)
    }

    /// 按固定顺序运行全部检查
    pub async fn run_all_checks(&self, project_id: &str) -> ApiResult<usize> {
        Ok(self.orchestrator.run_all_checks(project_id).await?)
    }

    /// 项目质控汇总
    pub async fn get_summary(&self, project_id: &str) -> ApiResult<ProjectQualitySummary> {
        Ok(self.orchestrator.get_summary(project_id).await?)
    }

    /// 单独运行漂移校正
    pub async fn run_drift_correction(
        &self,
        project_id: &str,
    ) -> ApiResult<Vec<DriftCorrectionResult>> {
        Ok(self.orchestrator.run_drift_correction(project_id).await?)
    }

    // ==========================================
    // 校准曲线
    // ==========================================

    /// 曲线历史（最新生效的一条 is_active = true）
    pub async fn list_curves(
        &self,
        project_id: &str,
        element: &str,
    ) -> ApiResult<Vec<CalibrationCurve>> {
        Ok(self.curves.list_curves(project_id, element).await?)
    }

    /// 排除/恢复生效曲线上的某个点，重新拟合并设为生效曲线
    pub async fn set_curve_point_excluded(
        &self,
        project_id: &str,
        element: &str,
        point_index: usize,
        excluded: bool,
    ) -> ApiResult<CalibrationCurve> {
        let current = self
            .curves
            .get_active_curve(project_id, element)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("项目 {} 元素 {} 无生效校准曲线", project_id, element))
            })?;

        let refit = self
            .calibration
            .set_point_excluded(&current, point_index, excluded, Utc::now())?;
        self.curves.save_curve(refit.clone()).await?;

        info!(
            project_id = %project_id,
            element = %element,
            point_index,
            excluded,
            r_squared = refit.r_squared,
            "校准点排除状态已更新，曲线已重新拟合"
        );
        Ok(refit)
    }

    // ==========================================
    // 报表
    // ==========================================

    /// 透视报表（检出限与小数位来自配置）
    pub async fn build_pivot_report(
        &self,
        project_id: &str,
        order: ElementOrder,
    ) -> ApiResult<PivotReport> {
        let (samples, results) = self.orchestrator.element_results(project_id).await?;

        let mut lod = HashMap::new();
        for element in samples.iter().flat_map(|s| s.elements()) {
            if !lod.contains_key(element) {
                let value = self
                    .config
                    .get_lod(element)
                    .await
                    .map_err(EngineError::from)?;
                lod.insert(element.to_string(), value);
            }
        }
        let decimals = self
            .config
            .get_report_decimals()
            .await
            .map_err(EngineError::from)?;

        let builder = PivotReportBuilder::new(PivotOptions {
            order,
            decimals,
            lod,
            default_lod: 0.0,
        });
        let report = builder.build(&samples, &results);

        info!(
            project_id = %project_id,
            rows = report.rows.len(),
            elements = report.element_headers.len(),
            "透视报表已生成"
        );
        Ok(report)
    }
}
