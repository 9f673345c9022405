// ==========================================
// ICP 分析质控系统 - 质控结果领域模型
// ==========================================
// 结果按 (sample_id, check_type) 覆盖，不合并
// 汇总每次全量重算，不做增量修补
// ==========================================

use crate::domain::types::{CheckStatus, CheckType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单样品单检查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheckResult {
    pub sample_id: String,
    pub check_type: CheckType,
    pub status: CheckStatus,
    pub detail: String,
}

impl QualityCheckResult {
    pub fn new(
        sample_id: impl Into<String>,
        check_type: CheckType,
        status: CheckStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            check_type,
            status,
            detail: detail.into(),
        }
    }
}

/// 分状态计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warning: usize,
    /// Pending / NotImplemented
    pub other: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: CheckStatus) {
        self.total += 1;
        match status {
            CheckStatus::Pass => self.passed += 1,
            CheckStatus::Fail => self.failed += 1,
            CheckStatus::Warning => self.warning += 1,
            CheckStatus::Pending | CheckStatus::NotImplemented => self.other += 1,
        }
    }
}

/// 项目质控汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectQualitySummary {
    pub project_id: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warning: usize,
    pub other: usize,
    /// 按检查类型细分（未运行的检查类型不出现）
    pub by_check: BTreeMap<CheckType, StatusCounts>,
}

impl ProjectQualitySummary {
    /// 由当前存储的结果全量计算
    pub fn from_results(project_id: &str, results: &[QualityCheckResult]) -> Self {
        let mut overall = StatusCounts::default();
        let mut by_check: BTreeMap<CheckType, StatusCounts> = BTreeMap::new();

        for result in results {
            overall.record(result.status);
            by_check
                .entry(result.check_type)
                .or_default()
                .record(result.status);
        }

        Self {
            project_id: project_id.to_string(),
            total: overall.total,
            passed: overall.passed,
            failed: overall.failed,
            warning: overall.warning,
            other: overall.other,
            by_check,
        }
    }
}

/// 单元素漂移校正结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftCorrectionResult {
    pub element_name: String,
    pub samples_corrected: usize,
    pub average_drift_factor: f64,
}
