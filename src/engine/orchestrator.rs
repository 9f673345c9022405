// ==========================================
// ICP 分析质控系统 - 质控编排器
// ==========================================
// 用途: 协调校准 / 规则集 / 漂移校正的执行顺序
// 全量顺序: Weight → Volume → DilutionFactor → Empty → CRM → DriftCalibration
// 并发: 单样品检查有界并行（扇出），全部完成后才汇总（屏障）
// 红线: 单元素拟合/预测失败只影响该元素，不中断整轮
// ==========================================

use crate::config::QcConfigReader;
use crate::domain::calibration::CurveKey;
use crate::domain::quality::{DriftCorrectionResult, ProjectQualitySummary, QualityCheckResult};
use crate::domain::report::ElementResult;
use crate::domain::sample::{ProjectSettings, Sample};
use crate::domain::types::CheckType;
use crate::engine::calibration::CalibrationEngine;
use crate::engine::drift::DriftCorrector;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::quality_rules::{self, CurveState, RuleContext, RuleThresholds};
use crate::repository::{CurveStore, SampleStore};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// CheckRunReport - 单检查运行结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRunReport {
    pub check_type: CheckType,
    pub evaluated: usize,
    /// 仅 DriftCalibration 填充
    pub drift_results: Vec<DriftCorrectionResult>,
}

/// 漂移阶段产出
#[derive(Debug, Default)]
struct DriftStage {
    results: Vec<DriftCorrectionResult>,
    factors: HashMap<String, Vec<(String, f64)>>,
    issues: HashMap<String, String>,
}

// ==========================================
// QualityControlOrchestrator - 质控编排器
// ==========================================
pub struct QualityControlOrchestrator<S: ?Sized, K: ?Sized, C>
where
    S: SampleStore,
    K: CurveStore,
    C: QcConfigReader,
{
    samples: Arc<S>,
    curves: Arc<K>,
    config: Arc<C>,
    calibration: CalibrationEngine,
    drift: DriftCorrector,
}

impl<S: ?Sized, K: ?Sized, C> QualityControlOrchestrator<S, K, C>
where
    S: SampleStore,
    K: CurveStore,
    C: QcConfigReader,
{
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - samples: 样品仓储
    /// - curves: 校准曲线仓储
    /// - config: 配置读取器
    pub fn new(samples: Arc<S>, curves: Arc<K>, config: Arc<C>) -> Self {
        Self {
            samples,
            curves,
            config,
            calibration: CalibrationEngine::new(),
            drift: DriftCorrector::new(),
        }
    }

    /// 运行单个检查，返回评估样品数
    pub async fn run_check(&self, project_id: &str, check_type: CheckType) -> EngineResult<usize> {
        Ok(self.run_check_detailed(project_id, check_type).await?.evaluated)
    }

    /// 按固定顺序运行全部检查，返回评估总数
    pub async fn run_all_checks(&self, project_id: &str) -> EngineResult<usize> {
        info!(project_id = %project_id, "开始全量质控");

        let mut total = 0;
        for check_type in CheckType::RUN_ORDER {
            total += self.run_check(project_id, check_type).await?;
        }

        info!(project_id = %project_id, evaluated = total, "全量质控完成");
        Ok(total)
    }

    /// 运行单个检查（含漂移校正明细）
    pub async fn run_check_detailed(
        &self,
        project_id: &str,
        check_type: CheckType,
    ) -> EngineResult<CheckRunReport> {
        let settings = self.samples.get_settings(project_id).await?;
        let samples = self.samples.list_samples(project_id).await?;
        let thresholds = self.load_thresholds().await?;

        debug!(
            project_id = %project_id,
            check_type = %check_type,
            samples = samples.len(),
            "开始质控检查"
        );

        let mut ctx = RuleContext::new(settings, thresholds);
        let mut drift_results = Vec::new();

        // ==========================================
        // 步骤1: 校准曲线（仅 CRM / 漂移需要）
        // ==========================================
        if check_type.needs_curves() {
            ctx.curves = self.resolve_curves(project_id, &samples).await?;
        }

        // ==========================================
        // 步骤2: 漂移校正（仅 DriftCalibration）
        // ==========================================
        if check_type == CheckType::DriftCalibration {
            let stage = self.apply_drift(project_id, &samples, &ctx.curves).await?;
            ctx.drift_factors = stage.factors;
            ctx.drift_issues = stage.issues;
            drift_results = stage.results;
        }

        // ==========================================
        // 步骤3: 单样品评估（扇出 + 屏障）
        // ==========================================
        let results = self.evaluate_samples(check_type, samples, Arc::new(ctx)).await?;
        let evaluated = results.len();

        // ==========================================
        // 步骤4: 保存结果（覆盖同类旧结果）
        // ==========================================
        self.samples.save_check_results(project_id, results).await?;

        info!(
            project_id = %project_id,
            check_type = %check_type,
            evaluated,
            "质控检查完成"
        );

        Ok(CheckRunReport {
            check_type,
            evaluated,
            drift_results,
        })
    }

    /// 由当前存储的结果全量重算汇总
    pub async fn get_summary(&self, project_id: &str) -> EngineResult<ProjectQualitySummary> {
        // 校验项目存在
        self.samples.get_settings(project_id).await?;
        let results = self.samples.list_check_results(project_id).await?;
        Ok(ProjectQualitySummary::from_results(project_id, &results))
    }

    /// 单独运行漂移校正（不写检查结果）
    pub async fn run_drift_correction(
        &self,
        project_id: &str,
    ) -> EngineResult<Vec<DriftCorrectionResult>> {
        self.samples.get_settings(project_id).await?;
        let samples = self.samples.list_samples(project_id).await?;
        let curves = self.resolve_curves(project_id, &samples).await?;
        let stage = self.apply_drift(project_id, &samples, &curves).await?;
        Ok(stage.results)
    }

    /// 报表用元素浓度（只读，不拟合曲线）
    ///
    /// 仅使用生效曲线：优先该曲线算出的漂移校正值，否则用该曲线预测；
    /// 没有生效曲线的元素不出结果
    pub async fn element_results(
        &self,
        project_id: &str,
    ) -> EngineResult<(Vec<Sample>, Vec<ElementResult>)> {
        self.samples.get_settings(project_id).await?;
        let samples = self.samples.list_samples(project_id).await?;

        let elements: BTreeSet<String> = samples
            .iter()
            .flat_map(|s| s.elements())
            .map(str::to_string)
            .collect();
        let mut active = HashMap::with_capacity(elements.len());
        for element in elements {
            if let Some(curve) = self.curves.get_active_curve(project_id, &element).await? {
                active.insert(element, curve);
            }
        }

        let mut results = Vec::new();
        for sample in &samples {
            for reading in &sample.readings {
                let curve = match active.get(&reading.element) {
                    Some(curve) => curve,
                    None => continue,
                };
                // 其他曲线算出的校正值已过期
                let concentration = match sample.corrected_for(&reading.element, &curve.curve_id) {
                    Some(value) => Some(value),
                    None => self
                        .calibration
                        .predict_concentration(curve, reading.intensity)
                        .ok(),
                };

                if let Some(concentration) = concentration {
                    results.push(ElementResult {
                        sample_id: sample.sample_id.clone(),
                        element: reading.element.clone(),
                        concentration,
                    });
                }
            }
        }

        Ok((samples, results))
    }

    /// 读取项目设置
    pub async fn settings(&self, project_id: &str) -> EngineResult<ProjectSettings> {
        Ok(self.samples.get_settings(project_id).await?)
    }

    // ==========================================
    // 内部步骤
    // ==========================================

    async fn load_thresholds(&self) -> EngineResult<RuleThresholds> {
        Ok(RuleThresholds {
            crm_fail_tolerance: self.config.get_crm_fail_tolerance().await?,
            crm_warning_tolerance: self.config.get_crm_warning_tolerance().await?,
            drift_factor_threshold: self.config.get_drift_factor_threshold().await?,
            empty_epsilon: self.config.get_empty_epsilon().await?,
        })
    }

    /// 每个元素取生效曲线；没有则用参考样品拟合并追加到曲线仓储
    async fn resolve_curves(
        &self,
        project_id: &str,
        samples: &[Sample],
    ) -> EngineResult<HashMap<String, CurveState>> {
        // 元素集合（稳定顺序）
        let elements: BTreeSet<String> = samples
            .iter()
            .flat_map(|s| s.elements())
            .map(str::to_string)
            .collect();

        let mut curves = HashMap::with_capacity(elements.len());
        for element in elements {
            if let Some(curve) = self.curves.get_active_curve(project_id, &element).await? {
                curves.insert(element, CurveState::Ready(curve));
                continue;
            }

            let key = CurveKey::new(project_id, element.clone());
            let points = self.calibration.points_from_standards(samples, &element);
            match self.calibration.fit(&key, &points, Utc::now()) {
                Ok(curve) => {
                    self.curves.save_curve(curve.clone()).await?;
                    info!(
                        project_id = %project_id,
                        element = %element,
                        r_squared = curve.r_squared,
                        "由参考样品拟合新校准曲线"
                    );
                    curves.insert(element, CurveState::Ready(curve));
                }
                Err(e) if e.is_element_scoped() => {
                    warn!(
                        project_id = %project_id,
                        element = %element,
                        error = %e,
                        "元素无可用校准曲线"
                    );
                    curves.insert(element, CurveState::Unavailable(e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(curves)
    }

    /// 逐元素漂移校正并附加校正浓度
    async fn apply_drift(
        &self,
        project_id: &str,
        samples: &[Sample],
        curves: &HashMap<String, CurveState>,
    ) -> EngineResult<DriftStage> {
        let mut stage = DriftStage::default();
        let mut elements: Vec<&String> = curves.keys().collect();
        elements.sort();

        let mut corrections = Vec::new();
        for element in elements {
            let curve = match &curves[element] {
                CurveState::Ready(curve) => curve,
                CurveState::Unavailable(reason) => {
                    stage.issues.insert(element.clone(), reason.clone());
                    continue;
                }
            };

            let outcome = match self.drift.correct_or_pass_through(curve, samples) {
                Ok(outcome) => outcome,
                Err(e) if e.is_element_scoped() => {
                    warn!(
                        project_id = %project_id,
                        element = %element,
                        error = %e,
                        "漂移校正失败，跳过该元素"
                    );
                    stage.issues.insert(element.clone(), e.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            };

            if outcome.pass_through {
                stage
                    .issues
                    .insert(element.clone(), "无参考数据，原始浓度直通".to_string());
            }
            for correction in &outcome.corrections {
                stage
                    .factors
                    .entry(correction.sample_id.clone())
                    .or_default()
                    .push((correction.element.clone(), correction.drift_factor));
            }
            corrections.extend(outcome.corrections);
            stage.results.push(outcome.result);
        }

        if !corrections.is_empty() {
            self.samples.attach_corrections(project_id, corrections).await?;
        }

        Ok(stage)
    }

    /// 有界并行评估，结果顺序与样品顺序一致
    async fn evaluate_samples(
        &self,
        check_type: CheckType,
        samples: Vec<Sample>,
        ctx: Arc<RuleContext>,
    ) -> EngineResult<Vec<QualityCheckResult>> {
        let limit = self.config.get_max_concurrency().await?;
        let rule = quality_rules::rule_for(check_type);

        let applicable: Vec<Sample> = samples
            .into_iter()
            .filter(|s| quality_rules::applies_to(check_type, s))
            .collect();

        let joined: Vec<Result<QualityCheckResult, tokio::task::JoinError>> =
            stream::iter(applicable)
                .map(|sample| {
                    let ctx = Arc::clone(&ctx);
                    tokio::task::spawn_blocking(move || rule(&sample, &ctx))
                })
                .buffered(limit)
                .collect()
                .await;

        joined
            .into_iter()
            .map(|r| {
                r.map_err(|e| {
                    EngineError::Internal(format!("检查 {} 评估任务异常: {}", check_type, e))
                })
            })
            .collect()
    }
}
