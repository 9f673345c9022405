// ==========================================
// ICP 分析质控系统 - 漂移校正器
// ==========================================
// 输入: 单元素的参考样品(CRM)时间序列 + 生效校准曲线
// 检查点漂移因子 = 预测浓度 / 认定浓度
// 普通样品: 相邻检查点之间按时间线性插值；首检查点之前/末检查点之后取最近检查点（不外推）
// 校正浓度 = 原始预测浓度 / 插值漂移因子
// 时间轴: 项目内全部样品都有测量时间才用时钟，否则整个项目改用进样顺序号
// ==========================================

use crate::domain::calibration::CalibrationCurve;
use crate::domain::quality::DriftCorrectionResult;
use crate::domain::sample::{Sample, SampleCorrection};
use crate::domain::types::SampleType;
use crate::engine::calibration::CalibrationEngine;
use crate::engine::error::{EngineError, EngineResult};
use tracing::{debug, warn};

/// 插值时间轴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAxis {
    /// 仪器测量时间（毫秒）
    Clock,
    /// 进样顺序号
    Sequence,
}

impl TimeAxis {
    /// 任一样品缺测量时间，整个项目改用顺序号
    pub fn for_samples(samples: &[Sample]) -> Self {
        if samples.iter().all(|s| s.measured_at.is_some()) {
            TimeAxis::Clock
        } else {
            TimeAxis::Sequence
        }
    }

    pub fn position(&self, sample: &Sample) -> f64 {
        match (self, sample.measured_at) {
            (TimeAxis::Clock, Some(at)) => at.timestamp_millis() as f64,
            _ => sample.sequence_no as f64,
        }
    }
}

/// 漂移检查点
#[derive(Debug, Clone, PartialEq)]
pub struct DriftCheckpoint {
    pub sample_id: String,
    /// 时间轴上的位置
    pub position: f64,
    pub drift_factor: f64,
}

/// 单元素漂移校正产出
#[derive(Debug, Clone, PartialEq)]
pub struct DriftOutcome {
    pub result: DriftCorrectionResult,
    pub checkpoints: Vec<DriftCheckpoint>,
    pub corrections: Vec<SampleCorrection>,
    pub axis: TimeAxis,
    /// 无参考数据，原始浓度直通
    pub pass_through: bool,
}

// ==========================================
// DriftCorrector - 漂移校正器
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct DriftCorrector {
    calibration: CalibrationEngine,
}

impl DriftCorrector {
    pub fn new() -> Self {
        Self {
            calibration: CalibrationEngine::new(),
        }
    }

    /// 计算检查点（按时间轴排序，时间轴由全部样品决定）
    ///
    /// 认定值或预测值非正的参考样品被跳过
    pub fn checkpoints(
        &self,
        curve: &CalibrationCurve,
        samples: &[Sample],
    ) -> EngineResult<Vec<DriftCheckpoint>> {
        self.checkpoints_on(curve, samples, TimeAxis::for_samples(samples))
    }

    fn checkpoints_on(
        &self,
        curve: &CalibrationCurve,
        samples: &[Sample],
        axis: TimeAxis,
    ) -> EngineResult<Vec<DriftCheckpoint>> {
        let element = curve.element.as_str();
        let mut references: Vec<&Sample> = samples
            .iter()
            .filter(|s| s.is_reference())
            .filter(|s| s.certified_value(element).is_some() && s.intensity(element).is_some())
            .collect();
        references.sort_by(|a, b| {
            axis.position(a)
                .total_cmp(&axis.position(b))
                .then(a.sequence_no.cmp(&b.sequence_no))
        });

        let mut checkpoints = Vec::with_capacity(references.len());
        for crm in references {
            let (certified, intensity) = match (crm.certified_value(element), crm.intensity(element)) {
                (Some(c), Some(i)) => (c, i),
                _ => continue,
            };
            let predicted = self.calibration.predict_concentration(curve, intensity)?;

            if certified <= 0.0 || predicted <= 0.0 || !predicted.is_finite() {
                warn!(
                    sample_id = %crm.sample_id,
                    element = %element,
                    certified,
                    predicted,
                    "参考样品认定值或预测值非正，跳过该检查点"
                );
                continue;
            }

            checkpoints.push(DriftCheckpoint {
                sample_id: crm.sample_id.clone(),
                position: axis.position(crm),
                drift_factor: predicted / certified,
            });
        }

        Ok(checkpoints)
    }

    /// 时间轴某位置的漂移因子（分段线性，两端钳制）
    ///
    /// checkpoints 需按位置排序；为空时返回 1.0（不校正）
    pub fn factor_at(checkpoints: &[DriftCheckpoint], at: f64) -> f64 {
        let (first, last) = match (checkpoints.first(), checkpoints.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return 1.0,
        };
        if at <= first.position {
            return first.drift_factor;
        }
        if at >= last.position {
            return last.drift_factor;
        }

        for pair in checkpoints.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if at >= a.position && at <= b.position {
                let span = b.position - a.position;
                if span <= 0.0 {
                    return a.drift_factor;
                }
                let weight = (at - a.position) / span;
                return a.drift_factor + (b.drift_factor - a.drift_factor) * weight;
            }
        }

        last.drift_factor
    }

    /// 校正单元素
    ///
    /// # 错误
    /// - NoReferenceData: 该元素没有可用参考样品
    /// - InactiveCurve: 曲线未生效
    pub fn correct(
        &self,
        curve: &CalibrationCurve,
        samples: &[Sample],
    ) -> EngineResult<DriftOutcome> {
        let element = curve.element.as_str();
        let axis = TimeAxis::for_samples(samples);
        let checkpoints = self.checkpoints_on(curve, samples, axis)?;
        if checkpoints.is_empty() {
            return Err(EngineError::NoReferenceData {
                project_id: curve.project_id.clone(),
                element: element.to_string(),
            });
        }

        let mut corrections = Vec::new();
        for sample in samples.iter().filter(|s| s.sample_type == SampleType::Sample) {
            let intensity = match sample.intensity(element) {
                Some(i) => i,
                None => continue,
            };
            let raw = self.calibration.predict_concentration(curve, intensity)?;
            let factor = Self::factor_at(&checkpoints, axis.position(sample));

            corrections.push(SampleCorrection {
                sample_id: sample.sample_id.clone(),
                element: element.to_string(),
                raw_concentration: raw,
                drift_factor: factor,
                corrected_concentration: raw / factor,
                curve_id: curve.curve_id.clone(),
            });
        }

        let average_drift_factor =
            checkpoints.iter().map(|c| c.drift_factor).sum::<f64>() / checkpoints.len() as f64;

        debug!(
            project_id = %curve.project_id,
            element = %element,
            checkpoints = checkpoints.len(),
            axis = ?axis,
            samples_corrected = corrections.len(),
            average_drift_factor,
            "漂移校正完成"
        );

        Ok(DriftOutcome {
            result: DriftCorrectionResult {
                element_name: element.to_string(),
                samples_corrected: corrections.len(),
                average_drift_factor,
            },
            checkpoints,
            corrections,
            axis,
            pass_through: false,
        })
    }

    /// 校正单元素，无参考数据时降级为直通
    pub fn correct_or_pass_through(
        &self,
        curve: &CalibrationCurve,
        samples: &[Sample],
    ) -> EngineResult<DriftOutcome> {
        match self.correct(curve, samples) {
            Err(EngineError::NoReferenceData { project_id, element }) => {
                warn!(
                    project_id = %project_id,
                    element = %element,
                    "无参考数据，跳过漂移校正，原始浓度直通"
                );
                Ok(Self::pass_through(&element))
            }
            other => other,
        }
    }

    /// 直通结果（零校正）
    pub fn pass_through(element: &str) -> DriftOutcome {
        DriftOutcome {
            result: DriftCorrectionResult {
                element_name: element.to_string(),
                samples_corrected: 0,
                average_drift_factor: 1.0,
            },
            checkpoints: Vec::new(),
            corrections: Vec::new(),
            axis: TimeAxis::Sequence,
            pass_through: true,
        }
    }
}
