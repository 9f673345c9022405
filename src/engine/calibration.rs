// ==========================================
// ICP 分析质控系统 - 校准引擎
// ==========================================
// 职责: 按元素拟合线性校准曲线，强度 → 浓度预测
// 回归: 普通最小二乘，自变量=强度，因变量=浓度
// 红线: 纯函数，同一输入集得到相同参数；排除是点属性而非删除
// ==========================================

use crate::domain::calibration::{CalibrationCurve, CalibrationPoint, CurveKey};
use crate::domain::sample::Sample;
use crate::engine::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// 线性拟合参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

// ==========================================
// CalibrationEngine - 校准引擎
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct CalibrationEngine;

impl CalibrationEngine {
    pub fn new() -> Self {
        Self
    }

    /// 拟合直线（仅使用未排除且数值有限的点）
    ///
    /// # 错误
    /// - InsufficientData: 可用点少于 2 个
    /// - DegenerateFit: 强度全部相同
    pub fn fit_line(&self, key: &CurveKey, points: &[CalibrationPoint]) -> EngineResult<LinearFit> {
        let usable: Vec<&CalibrationPoint> = points
            .iter()
            .filter(|p| !p.excluded && p.intensity.is_finite() && p.concentration.is_finite())
            .collect();

        if usable.len() < 2 {
            return Err(EngineError::InsufficientData {
                project_id: key.project_id.clone(),
                element: key.element.clone(),
                usable: usable.len(),
            });
        }

        let first_x = usable[0].intensity;
        if usable.iter().all(|p| p.intensity == first_x) {
            return Err(EngineError::DegenerateFit {
                project_id: key.project_id.clone(),
                element: key.element.clone(),
            });
        }

        let n = usable.len() as f64;
        let mean_x = usable.iter().map(|p| p.intensity).sum::<f64>() / n;
        let mean_y = usable.iter().map(|p| p.concentration).sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut syy = 0.0;
        for p in &usable {
            let dx = p.intensity - mean_x;
            let dy = p.concentration - mean_y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }

        if sxx <= 0.0 || !sxx.is_finite() {
            return Err(EngineError::DegenerateFit {
                project_id: key.project_id.clone(),
                element: key.element.clone(),
            });
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let ss_res: f64 = usable
            .iter()
            .map(|p| {
                let residual = p.concentration - (slope * p.intensity + intercept);
                residual * residual
            })
            .sum();

        // 浓度无方差时直线完全贴合
        let r_squared = if syy <= 0.0 {
            1.0
        } else {
            (1.0 - ss_res / syy).clamp(0.0, 1.0)
        };

        Ok(LinearFit {
            slope,
            intercept,
            r_squared,
        })
    }

    /// 拟合校准曲线（新曲线默认生效）
    pub fn fit(
        &self,
        key: &CurveKey,
        points: &[CalibrationPoint],
        calibration_date: DateTime<Utc>,
    ) -> EngineResult<CalibrationCurve> {
        let line = self.fit_line(key, points)?;

        debug!(
            project_id = %key.project_id,
            element = %key.element,
            slope = line.slope,
            intercept = line.intercept,
            r_squared = line.r_squared,
            "校准曲线拟合完成"
        );

        Ok(CalibrationCurve {
            curve_id: Uuid::new_v4().to_string(),
            project_id: key.project_id.clone(),
            element: key.element.clone(),
            points: points.to_vec(),
            slope: line.slope,
            intercept: line.intercept,
            r_squared: line.r_squared,
            is_active: true,
            calibration_date,
        })
    }

    /// 切换某个点的排除标记并重新拟合（生成新曲线，原曲线不变）
    pub fn set_point_excluded(
        &self,
        curve: &CalibrationCurve,
        index: usize,
        excluded: bool,
        calibration_date: DateTime<Utc>,
    ) -> EngineResult<CalibrationCurve> {
        let mut points = curve.points.clone();
        let point = points.get_mut(index).ok_or_else(|| EngineError::NotFound {
            entity: "CalibrationPoint".to_string(),
            id: format!("{}#{}", curve.curve_id, index),
        })?;
        point.excluded = excluded;

        self.fit(&curve.key(), &points, calibration_date)
    }

    /// 强度 → 浓度
    ///
    /// # 错误
    /// - InactiveCurve: 曲线未生效，调用方需重新拟合或改用生效曲线
    pub fn predict_concentration(
        &self,
        curve: &CalibrationCurve,
        intensity: f64,
    ) -> EngineResult<f64> {
        if !curve.is_active {
            return Err(EngineError::InactiveCurve {
                curve_id: curve.curve_id.clone(),
                element: curve.element.clone(),
            });
        }
        Ok(curve.slope * intensity + curve.intercept)
    }

    /// 由项目参考样品收集标准点（认定值 vs 强度）
    pub fn points_from_standards(&self, samples: &[Sample], element: &str) -> Vec<CalibrationPoint> {
        samples
            .iter()
            .filter(|s| s.is_reference())
            .filter_map(|s| match (s.certified_value(element), s.intensity(element)) {
                (Some(concentration), Some(intensity)) => {
                    Some(CalibrationPoint::new(concentration, intensity))
                }
                _ => None,
            })
            .collect()
    }
}
