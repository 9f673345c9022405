// ==========================================
// ICP 分析质控系统 - 校准曲线仓储
// ==========================================
// 存储模型: 每个 (项目, 元素) 一条追加日志 + 当前生效指针
// 红线: 历史拟合不做原地修改，保留审计轨迹
// ==========================================

use crate::domain::calibration::{CalibrationCurve, CurveKey};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// CurveStore Trait
// ==========================================
#[async_trait]
pub trait CurveStore: Send + Sync {
    /// 读取当前生效曲线
    async fn get_active_curve(
        &self,
        project_id: &str,
        element: &str,
    ) -> RepositoryResult<Option<CalibrationCurve>>;

    /// 追加曲线并设为生效
    async fn save_curve(&self, curve: CalibrationCurve) -> RepositoryResult<()>;

    /// 曲线历史（旧到新）
    async fn list_curves(&self, project_id: &str, element: &str)
        -> RepositoryResult<Vec<CalibrationCurve>>;

    /// 取消生效指针（之后需重新拟合）
    async fn deactivate(&self, project_id: &str, element: &str) -> RepositoryResult<()>;
}

// ==========================================
// InMemoryCurveStore - 内存实现
// ==========================================
#[derive(Debug, Default)]
struct CurveHistory {
    curves: Vec<CalibrationCurve>,
    active: Option<usize>,
}

impl CurveHistory {
    fn view(&self, idx: usize) -> CalibrationCurve {
        let mut curve = self.curves[idx].clone();
        curve.is_active = self.active == Some(idx);
        curve
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCurveStore {
    logs: Arc<Mutex<HashMap<CurveKey, CurveHistory>>>,
}

impl InMemoryCurveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CurveStore for InMemoryCurveStore {
    async fn get_active_curve(
        &self,
        project_id: &str,
        element: &str,
    ) -> RepositoryResult<Option<CalibrationCurve>> {
        let logs = self.logs.lock()?;
        let key = CurveKey::new(project_id, element);
        Ok(logs
            .get(&key)
            .and_then(|h| h.active.map(|idx| h.view(idx))))
    }

    async fn save_curve(&self, curve: CalibrationCurve) -> RepositoryResult<()> {
        if curve.usable_points() < 2 {
            return Err(RepositoryError::ValidationError(format!(
                "曲线 {} 可用点不足 2 个",
                curve.curve_id
            )));
        }

        let mut logs = self.logs.lock()?;
        let history = logs.entry(curve.key()).or_default();
        let activate = curve.is_active;
        history.curves.push(curve);
        if activate {
            history.active = Some(history.curves.len() - 1);
        }
        Ok(())
    }

    async fn list_curves(
        &self,
        project_id: &str,
        element: &str,
    ) -> RepositoryResult<Vec<CalibrationCurve>> {
        let logs = self.logs.lock()?;
        let key = CurveKey::new(project_id, element);
        Ok(logs
            .get(&key)
            .map(|h| (0..h.curves.len()).map(|idx| h.view(idx)).collect())
            .unwrap_or_default())
    }

    async fn deactivate(&self, project_id: &str, element: &str) -> RepositoryResult<()> {
        let mut logs = self.logs.lock()?;
        let key = CurveKey::new(project_id, element);
        let history = logs.get_mut(&key).ok_or_else(|| RepositoryError::NotFound {
            entity: "CalibrationCurve".to_string(),
            id: format!("{}/{}", project_id, element),
        })?;
        history.active = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calibration::CalibrationPoint;
    use chrono::Utc;

    fn curve(id: &str, slope: f64) -> CalibrationCurve {
        CalibrationCurve {
            curve_id: id.to_string(),
            project_id: "P1".to_string(),
            element: "Cu63".to_string(),
            points: vec![CalibrationPoint::new(0.0, 0.0), CalibrationPoint::new(1.0, 10.0)],
            slope,
            intercept: 0.0,
            r_squared: 1.0,
            is_active: true,
            calibration_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_only_with_active_pointer() {
        let store = InMemoryCurveStore::new();
        store.save_curve(curve("C1", 0.1)).await.unwrap();
        store.save_curve(curve("C2", 0.2)).await.unwrap();

        let active = store.get_active_curve("P1", "Cu63").await.unwrap().unwrap();
        assert_eq!(active.curve_id, "C2");

        let history = store.list_curves("P1", "Cu63").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].is_active);
        assert!(history[1].is_active);
    }

    #[tokio::test]
    async fn test_deactivate_clears_pointer() {
        let store = InMemoryCurveStore::new();
        store.save_curve(curve("C1", 0.1)).await.unwrap();
        store.deactivate("P1", "Cu63").await.unwrap();

        assert!(store.get_active_curve("P1", "Cu63").await.unwrap().is_none());
        assert_eq!(store.list_curves("P1", "Cu63").await.unwrap().len(), 1);
    }
}
