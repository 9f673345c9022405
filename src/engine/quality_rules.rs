// ==========================================
// ICP 分析质控系统 - 质控规则集
// ==========================================
// 职责: 每种检查类型一个纯函数，输出 QualityCheckResult
// 红线: 无隐藏状态，可重复运行、可跨样品并行
// 扩展: 新增 CheckType 变体 + 规则函数 + 查找表条目
// ==========================================

use crate::domain::calibration::CalibrationCurve;
use crate::domain::quality::QualityCheckResult;
use crate::domain::sample::{ProjectSettings, Sample};
use crate::domain::types::{CheckStatus, CheckType, SampleType};
use crate::engine::calibration::CalibrationEngine;
use std::collections::HashMap;

/// 规则函数签名
pub type RuleFn = fn(&Sample, &RuleContext) -> QualityCheckResult;

/// 全局阈值（来自 QcConfigReader）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleThresholds {
    pub crm_fail_tolerance: f64,
    pub crm_warning_tolerance: f64,
    pub drift_factor_threshold: f64,
    pub empty_epsilon: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            crm_fail_tolerance: 0.10,
            crm_warning_tolerance: 0.05,
            drift_factor_threshold: 0.10,
            empty_epsilon: 1e-6,
        }
    }
}

/// 单元素曲线状态
#[derive(Debug, Clone)]
pub enum CurveState {
    Ready(CalibrationCurve),
    /// 无法拟合/使用，附原因
    Unavailable(String),
}

/// 规则上下文（单轮质控只读）
#[derive(Debug, Clone, Default)]
pub struct RuleContext {
    pub settings: ProjectSettings,
    pub thresholds: RuleThresholds,
    /// element -> 曲线状态
    pub curves: HashMap<String, CurveState>,
    /// sample_id -> [(element, 实际使用的漂移因子)]
    pub drift_factors: HashMap<String, Vec<(String, f64)>>,
    /// element -> 未校正原因（无参考数据/无曲线）
    pub drift_issues: HashMap<String, String>,
    /// 浓度预测（各规则共用）
    pub calibration: CalibrationEngine,
}

impl RuleContext {
    pub fn new(settings: ProjectSettings, thresholds: RuleThresholds) -> Self {
        Self {
            settings,
            thresholds,
            ..Default::default()
        }
    }
}

// ==========================================
// 查找表
// ==========================================

/// 检查类型 → 规则函数
pub fn rule_for(check_type: CheckType) -> RuleFn {
    match check_type {
        CheckType::WeightCheck => weight_check,
        CheckType::VolumeCheck => volume_check,
        CheckType::DilutionFactorCheck => dilution_factor_check,
        CheckType::EmptyCheck => empty_check,
        CheckType::CrmCheck => crm_check,
        CheckType::DriftCalibration => drift_calibration_check,
    }
}

/// 检查是否适用于该样品
pub fn applies_to(check_type: CheckType, sample: &Sample) -> bool {
    match check_type {
        CheckType::CrmCheck => sample.sample_type == SampleType::Standard,
        _ => sample.sample_type == SampleType::Sample,
    }
}

/// 执行单个检查
pub fn evaluate(check_type: CheckType, sample: &Sample, ctx: &RuleContext) -> QualityCheckResult {
    rule_for(check_type)(sample, ctx)
}

// ==========================================
// 范围类检查（重量/体积/稀释倍数）
// ==========================================

fn range_check(
    sample: &Sample,
    check_type: CheckType,
    field: &str,
    value: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
) -> QualityCheckResult {
    // 未配置上下限: 跳过 → Pass，避免误报
    if min.is_none() && max.is_none() {
        return QualityCheckResult::new(
            &sample.sample_id,
            check_type,
            CheckStatus::Pass,
            format!("{}未配置上下限，跳过", field),
        );
    }

    let value = match value {
        Some(v) if v.is_finite() => v,
        _ => {
            return QualityCheckResult::new(
                &sample.sample_id,
                check_type,
                CheckStatus::Fail,
                format!("{}缺失", field),
            )
        }
    };

    if let Some(lo) = min {
        if value < lo {
            return QualityCheckResult::new(
                &sample.sample_id,
                check_type,
                CheckStatus::Fail,
                format!("{} {:.4} 低于下限 {:.4}", field, value, lo),
            );
        }
    }
    if let Some(hi) = max {
        if value > hi {
            return QualityCheckResult::new(
                &sample.sample_id,
                check_type,
                CheckStatus::Fail,
                format!("{} {:.4} 超过上限 {:.4}", field, value, hi),
            );
        }
    }

    QualityCheckResult::new(
        &sample.sample_id,
        check_type,
        CheckStatus::Pass,
        format!("{} {:.4} 在范围内", field, value),
    )
}

pub fn weight_check(sample: &Sample, ctx: &RuleContext) -> QualityCheckResult {
    range_check(
        sample,
        CheckType::WeightCheck,
        "重量",
        sample.weight,
        ctx.settings.min_weight,
        ctx.settings.max_weight,
    )
}

pub fn volume_check(sample: &Sample, ctx: &RuleContext) -> QualityCheckResult {
    range_check(
        sample,
        CheckType::VolumeCheck,
        "体积",
        sample.volume,
        ctx.settings.min_volume,
        ctx.settings.max_volume,
    )
}

pub fn dilution_factor_check(sample: &Sample, ctx: &RuleContext) -> QualityCheckResult {
    range_check(
        sample,
        CheckType::DilutionFactorCheck,
        "稀释倍数",
        sample.dilution_factor,
        ctx.settings.min_dilution_factor,
        ctx.settings.max_dilution_factor,
    )
}

// ==========================================
// 空样检查
// ==========================================

pub fn empty_check(sample: &Sample, ctx: &RuleContext) -> QualityCheckResult {
    let epsilon = ctx
        .settings
        .empty_threshold
        .unwrap_or(ctx.thresholds.empty_epsilon);
    let near_zero = |v: f64| v.abs() <= epsilon;

    let weight_zero = near_zero(sample.weight.unwrap_or(0.0));
    let volume_zero = near_zero(sample.volume.unwrap_or(0.0));
    let intensities_zero = sample.readings.iter().all(|r| near_zero(r.intensity));

    if weight_zero && volume_zero && intensities_zero {
        QualityCheckResult::new(
            &sample.sample_id,
            CheckType::EmptyCheck,
            CheckStatus::Fail,
            format!("重量/体积/全部强度均 ≤ {:e}，疑似空样", epsilon),
        )
    } else {
        QualityCheckResult::new(&sample.sample_id, CheckType::EmptyCheck, CheckStatus::Pass, "非空样")
    }
}

// ==========================================
// CRM 检查
// ==========================================

pub fn crm_check(sample: &Sample, ctx: &RuleContext) -> QualityCheckResult {
    if sample.certified.is_empty() {
        return QualityCheckResult::new(
            &sample.sample_id,
            CheckType::CrmCheck,
            CheckStatus::NotImplemented,
            "参考样品无认定值",
        );
    }

    let mut status = CheckStatus::Pass;
    let mut details = Vec::with_capacity(sample.certified.len());

    for (element, &certified) in &sample.certified {
        let (element_status, detail) = match crm_element(sample, element, certified, ctx) {
            Ok((s, d)) => (s, d),
            Err(reason) => (CheckStatus::Warning, reason),
        };
        status = status.worst(element_status);
        details.push(format!("{}: {}", element, detail));
    }

    QualityCheckResult::new(&sample.sample_id, CheckType::CrmCheck, status, details.join("; "))
}

fn crm_element(
    sample: &Sample,
    element: &str,
    certified: f64,
    ctx: &RuleContext,
) -> Result<(CheckStatus, String), String> {
    if certified <= 0.0 || !certified.is_finite() {
        return Err(format!("认定值非法 {}", certified));
    }
    let intensity = sample
        .intensity(element)
        .ok_or_else(|| "缺少仪器读数".to_string())?;
    let curve = match ctx.curves.get(element) {
        Some(CurveState::Ready(curve)) => curve,
        Some(CurveState::Unavailable(reason)) => return Err(reason.clone()),
        None => return Err("无校准曲线".to_string()),
    };
    let predicted = ctx
        .calibration
        .predict_concentration(curve, intensity)
        .map_err(|e| e.to_string())?;

    let deviation = (predicted - certified).abs() / certified;
    let status = if deviation > ctx.thresholds.crm_fail_tolerance {
        CheckStatus::Fail
    } else if deviation > ctx.thresholds.crm_warning_tolerance {
        CheckStatus::Warning
    } else {
        CheckStatus::Pass
    };

    Ok((
        status,
        format!(
            "测得 {:.4} / 认定 {:.4}，偏差 {:.2}%",
            predicted,
            certified,
            deviation * 100.0
        ),
    ))
}

// ==========================================
// 漂移检查
// ==========================================

pub fn drift_calibration_check(sample: &Sample, ctx: &RuleContext) -> QualityCheckResult {
    let mut status = CheckStatus::Pass;
    let mut details = Vec::new();
    let applied = ctx.drift_factors.get(&sample.sample_id);

    for element in sample.elements() {
        if let Some(reason) = ctx.drift_issues.get(element) {
            status = status.worst(CheckStatus::Warning);
            details.push(format!("{}: 未校正（{}）", element, reason));
            continue;
        }

        let factor = applied.and_then(|entries| {
            entries
                .iter()
                .find(|(e, _)| e == element)
                .map(|(_, f)| *f)
        });

        if let Some(factor) = factor {
            let drift = (factor - 1.0).abs();
            if drift > ctx.thresholds.drift_factor_threshold {
                status = status.worst(CheckStatus::Fail);
                details.push(format!(
                    "{}: 漂移因子 {:.4} 超出阈值 ±{:.2}",
                    element, factor, ctx.thresholds.drift_factor_threshold
                ));
            } else {
                details.push(format!("{}: 漂移因子 {:.4}", element, factor));
            }
        }
    }

    let detail = if details.is_empty() {
        "无可校正元素".to_string()
    } else {
        details.join("; ")
    };

    QualityCheckResult::new(&sample.sample_id, CheckType::DriftCalibration, status, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calibration::CalibrationPoint;
    use crate::domain::sample::ElementReading;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn create_test_sample(weight: Option<f64>) -> Sample {
        Sample {
            sample_id: "S1".to_string(),
            project_id: "P1".to_string(),
            solution_label: "SOIL-01".to_string(),
            sample_type: SampleType::Sample,
            weight,
            volume: Some(50.0),
            dilution_factor: Some(10.0),
            readings: vec![ElementReading {
                element: "Cu63".to_string(),
                intensity: 1200.0,
            }],
            certified: BTreeMap::new(),
            measured_at: None,
            sequence_no: 0,
            corrected: BTreeMap::new(),
        }
    }

    fn ctx_with_weight_bounds(min: Option<f64>, max: Option<f64>) -> RuleContext {
        let settings = ProjectSettings {
            min_weight: min,
            max_weight: max,
            ..Default::default()
        };
        RuleContext::new(settings, RuleThresholds::default())
    }

    fn ctx_with_settings(settings: ProjectSettings) -> RuleContext {
        RuleContext::new(settings, RuleThresholds::default())
    }

    fn identity_curve() -> CalibrationCurve {
        CalibrationCurve {
            curve_id: "C1".to_string(),
            project_id: "P1".to_string(),
            element: "Cu63".to_string(),
            points: vec![CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(10.0, 10.0)],
            slope: 1.0,
            intercept: 0.0,
            r_squared: 1.0,
            is_active: true,
            calibration_date: Utc::now(),
        }
    }

    #[test]
    fn test_weight_below_min_fails() {
        let ctx = ctx_with_weight_bounds(Some(0.5), Some(5.0));
        let result = weight_check(&create_test_sample(Some(0.2)), &ctx);
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[test]
    fn test_weight_in_range_passes() {
        let ctx = ctx_with_weight_bounds(Some(0.5), Some(5.0));
        let result = weight_check(&create_test_sample(Some(2.0)), &ctx);
        assert_eq!(result.status, CheckStatus::Pass);
    }

    #[test]
    fn test_weight_bounds_unset_skips() {
        let ctx = ctx_with_weight_bounds(None, None);
        let result = weight_check(&create_test_sample(Some(0.2)), &ctx);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.detail.contains("跳过"));
    }

    #[test]
    fn test_weight_missing_with_bounds_fails() {
        let ctx = ctx_with_weight_bounds(Some(0.5), None);
        let result = weight_check(&create_test_sample(None), &ctx);
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[test]
    fn test_volume_bounds() {
        let ctx = ctx_with_settings(ProjectSettings {
            min_volume: Some(10.0),
            max_volume: Some(100.0),
            ..Default::default()
        });
        let mut sample = create_test_sample(Some(1.0));

        sample.volume = Some(5.0);
        let result = volume_check(&sample, &ctx);
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.check_type, CheckType::VolumeCheck);
        assert!(result.detail.contains("低于下限"));

        sample.volume = Some(150.0);
        let result = volume_check(&sample, &ctx);
        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.detail.contains("超过上限"));

        sample.volume = Some(50.0);
        assert_eq!(volume_check(&sample, &ctx).status, CheckStatus::Pass);

        sample.volume = None;
        assert_eq!(volume_check(&sample, &ctx).status, CheckStatus::Fail);
    }

    #[test]
    fn test_volume_bounds_unset_skips() {
        let ctx = ctx_with_settings(ProjectSettings::default());
        let mut sample = create_test_sample(Some(1.0));
        sample.volume = Some(-3.0);
        let result = volume_check(&sample, &ctx);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.detail.contains("跳过"));
    }

    #[test]
    fn test_dilution_factor_bounds() {
        let ctx = ctx_with_settings(ProjectSettings {
            min_dilution_factor: Some(1.0),
            max_dilution_factor: Some(50.0),
            ..Default::default()
        });
        let mut sample = create_test_sample(Some(1.0));

        sample.dilution_factor = Some(0.5);
        let result = dilution_factor_check(&sample, &ctx);
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.check_type, CheckType::DilutionFactorCheck);

        sample.dilution_factor = Some(100.0);
        assert_eq!(dilution_factor_check(&sample, &ctx).status, CheckStatus::Fail);

        sample.dilution_factor = Some(10.0);
        assert_eq!(dilution_factor_check(&sample, &ctx).status, CheckStatus::Pass);

        sample.dilution_factor = None;
        assert_eq!(dilution_factor_check(&sample, &ctx).status, CheckStatus::Fail);
    }

    #[test]
    fn test_dilution_factor_single_sided_bound() {
        let ctx = ctx_with_settings(ProjectSettings {
            max_dilution_factor: Some(20.0),
            ..Default::default()
        });
        let mut sample = create_test_sample(Some(1.0));

        // 只有上限时任意小值都通过
        sample.dilution_factor = Some(0.001);
        assert_eq!(dilution_factor_check(&sample, &ctx).status, CheckStatus::Pass);

        sample.dilution_factor = Some(20.5);
        assert_eq!(dilution_factor_check(&sample, &ctx).status, CheckStatus::Fail);

        let unset = ctx_with_settings(ProjectSettings::default());
        assert_eq!(dilution_factor_check(&sample, &unset).status, CheckStatus::Pass);
    }

    #[test]
    fn test_empty_check() {
        let ctx = RuleContext::default();
        let mut sample = create_test_sample(Some(0.0));
        sample.volume = Some(0.0);
        sample.readings[0].intensity = 0.0;
        assert_eq!(empty_check(&sample, &ctx).status, CheckStatus::Fail);

        sample.readings[0].intensity = 10.0;
        assert_eq!(empty_check(&sample, &ctx).status, CheckStatus::Pass);
    }

    #[test]
    fn test_empty_check_project_threshold_overrides_global() {
        let mut ctx = RuleContext::default();
        ctx.settings.empty_threshold = Some(20.0);
        let mut sample = create_test_sample(Some(0.0));
        sample.volume = None;
        sample.readings[0].intensity = 15.0;
        assert_eq!(empty_check(&sample, &ctx).status, CheckStatus::Fail);
    }

    #[test]
    fn test_crm_bands() {
        let mut ctx = RuleContext::default();
        ctx.curves
            .insert("Cu63".to_string(), CurveState::Ready(identity_curve()));

        let mut crm = create_test_sample(None);
        crm.sample_type = SampleType::Standard;
        crm.certified.insert("Cu63".to_string(), 10.0);

        crm.readings[0].intensity = 10.2; // 2%
        assert_eq!(crm_check(&crm, &ctx).status, CheckStatus::Pass);

        crm.readings[0].intensity = 10.7; // 7%
        assert_eq!(crm_check(&crm, &ctx).status, CheckStatus::Warning);

        crm.readings[0].intensity = 12.0; // 20%
        assert_eq!(crm_check(&crm, &ctx).status, CheckStatus::Fail);
    }

    #[test]
    fn test_crm_without_curve_warns() {
        let ctx = RuleContext::default();
        let mut crm = create_test_sample(None);
        crm.sample_type = SampleType::Standard;
        crm.certified.insert("Cu63".to_string(), 10.0);

        let result = crm_check(&crm, &ctx);
        assert_eq!(result.status, CheckStatus::Warning);
    }

    #[test]
    fn test_drift_check_threshold() {
        let mut ctx = RuleContext::default();
        let sample = create_test_sample(Some(1.0));
        ctx.drift_factors
            .insert("S1".to_string(), vec![("Cu63".to_string(), 1.05)]);
        assert_eq!(drift_calibration_check(&sample, &ctx).status, CheckStatus::Pass);

        ctx.drift_factors
            .insert("S1".to_string(), vec![("Cu63".to_string(), 1.25)]);
        assert_eq!(drift_calibration_check(&sample, &ctx).status, CheckStatus::Fail);

        ctx.drift_issues
            .insert("Cu63".to_string(), "无参考数据".to_string());
        assert_eq!(drift_calibration_check(&sample, &ctx).status, CheckStatus::Warning);
    }

    #[test]
    fn test_applicability() {
        let mut sample = create_test_sample(Some(1.0));
        assert!(applies_to(CheckType::WeightCheck, &sample));
        assert!(!applies_to(CheckType::CrmCheck, &sample));

        sample.sample_type = SampleType::Blank;
        assert!(CheckType::RUN_ORDER.iter().all(|c| !applies_to(*c, &sample)));
    }
}
