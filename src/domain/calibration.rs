// ==========================================
// ICP 分析质控系统 - 校准曲线领域模型
// ==========================================
// 回归方向: 强度为自变量，浓度为因变量
// 曲线以追加日志保存，is_active 指向当前生效曲线
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 曲线键（项目 + 元素）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurveKey {
    pub project_id: String,
    pub element: String,
}

impl CurveKey {
    pub fn new(project_id: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            element: element.into(),
        }
    }
}

/// 标准点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub concentration: f64,
    pub intensity: f64,
    /// 排除标记（不删除点，仅不参与拟合）
    #[serde(default)]
    pub excluded: bool,
}

impl CalibrationPoint {
    pub fn new(concentration: f64, intensity: f64) -> Self {
        Self {
            concentration,
            intensity,
            excluded: false,
        }
    }
}

/// 校准曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    pub curve_id: String,
    pub project_id: String,
    pub element: String,
    pub points: Vec<CalibrationPoint>,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub is_active: bool,
    pub calibration_date: DateTime<Utc>,
}

impl CalibrationCurve {
    pub fn key(&self) -> CurveKey {
        CurveKey::new(self.project_id.clone(), self.element.clone())
    }

    /// 参与拟合的点数
    pub fn usable_points(&self) -> usize {
        self.points.iter().filter(|p| !p.excluded).count()
    }
}
