// ==========================================
// ICP 分析质控系统 - 样品仓储
// ==========================================
// 职责: 样品 / 项目设置 / 质控结果的存取接口
// 红线: Repository 不含业务逻辑
// 说明: 持久化由外部实现，此处附带内存实现供测试与 CLI 使用
// ==========================================

use crate::domain::quality::QualityCheckResult;
use crate::domain::sample::{CorrectedConcentration, ProjectSettings, Sample, SampleCorrection};
use crate::domain::types::CheckType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

// ==========================================
// SampleStore Trait
// ==========================================
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// 列出项目样品（导入顺序）
    async fn list_samples(&self, project_id: &str) -> RepositoryResult<Vec<Sample>>;

    /// 读取项目质控设置
    async fn get_settings(&self, project_id: &str) -> RepositoryResult<ProjectSettings>;

    /// 预留 count 个连续顺序号，返回起始值（并发导入互不重叠）
    async fn reserve_sequence(&self, project_id: &str, count: usize) -> RepositoryResult<usize>;

    /// 保存一批导入完成的样品
    ///
    /// 整批校验: sample_id 与项目已有样品或批内重复时拒绝整批
    async fn save_samples(&self, project_id: &str, samples: Vec<Sample>) -> RepositoryResult<()>;

    /// 保存质控结果（同 sample_id + check_type 覆盖旧结果）
    async fn save_check_results(
        &self,
        project_id: &str,
        results: Vec<QualityCheckResult>,
    ) -> RepositoryResult<()>;

    /// 读取当前存储的全部质控结果
    async fn list_check_results(&self, project_id: &str)
        -> RepositoryResult<Vec<QualityCheckResult>>;

    /// 附加漂移校正浓度（同元素覆盖，记录所用曲线）
    async fn attach_corrections(
        &self,
        project_id: &str,
        corrections: Vec<SampleCorrection>,
    ) -> RepositoryResult<()>;
}

// ==========================================
// InMemorySampleStore - 内存实现
// ==========================================
#[derive(Default)]
struct ProjectRecord {
    settings: ProjectSettings,
    samples: Vec<Sample>,
    next_sequence: usize,
    // (sample_id, check_type) -> 结果下标，保持首次写入顺序
    result_index: HashMap<(String, CheckType), usize>,
    results: Vec<QualityCheckResult>,
}

#[derive(Default, Clone)]
pub struct InMemorySampleStore {
    projects: Arc<Mutex<HashMap<String, ProjectRecord>>>,
}

impl InMemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册项目（已存在则只更新设置）
    pub fn register_project(
        &self,
        project_id: &str,
        settings: ProjectSettings,
    ) -> RepositoryResult<()> {
        let mut projects = self.projects.lock()?;
        projects
            .entry(project_id.to_string())
            .or_default()
            .settings = settings;
        Ok(())
    }

    fn not_found(project_id: &str) -> RepositoryError {
        RepositoryError::NotFound {
            entity: "Project".to_string(),
            id: project_id.to_string(),
        }
    }
}

#[async_trait]
impl SampleStore for InMemorySampleStore {
    async fn list_samples(&self, project_id: &str) -> RepositoryResult<Vec<Sample>> {
        let projects = self.projects.lock()?;
        let record = projects
            .get(project_id)
            .ok_or_else(|| Self::not_found(project_id))?;
        Ok(record.samples.clone())
    }

    async fn get_settings(&self, project_id: &str) -> RepositoryResult<ProjectSettings> {
        let projects = self.projects.lock()?;
        let record = projects
            .get(project_id)
            .ok_or_else(|| Self::not_found(project_id))?;
        Ok(record.settings.clone())
    }

    async fn reserve_sequence(&self, project_id: &str, count: usize) -> RepositoryResult<usize> {
        let mut projects = self.projects.lock()?;
        let record = projects
            .get_mut(project_id)
            .ok_or_else(|| Self::not_found(project_id))?;

        let start = record.next_sequence;
        record.next_sequence += count;
        Ok(start)
    }

    async fn save_samples(&self, project_id: &str, samples: Vec<Sample>) -> RepositoryResult<()> {
        let mut projects = self.projects.lock()?;
        let record = projects
            .get_mut(project_id)
            .ok_or_else(|| Self::not_found(project_id))?;

        // 先整批校验，再写入
        let mut seen: HashSet<&str> = record.samples.iter().map(|s| s.sample_id.as_str()).collect();
        for sample in &samples {
            if sample.project_id != project_id {
                return Err(RepositoryError::FieldValueError {
                    field: "project_id".to_string(),
                    message: format!(
                        "样品 {} 属于项目 {}，不能写入项目 {}",
                        sample.sample_id, sample.project_id, project_id
                    ),
                });
            }
            if !seen.insert(sample.sample_id.as_str()) {
                return Err(RepositoryError::AlreadyExists {
                    entity: "Sample".to_string(),
                    id: sample.sample_id.clone(),
                });
            }
        }

        if let Some(max_seq) = samples.iter().map(|s| s.sequence_no).max() {
            record.next_sequence = record.next_sequence.max(max_seq + 1);
        }
        record.samples.extend(samples);
        // 并发导入的落库顺序不定，按顺序号保持进样顺序
        record.samples.sort_by_key(|s| s.sequence_no);
        Ok(())
    }

    async fn save_check_results(
        &self,
        project_id: &str,
        results: Vec<QualityCheckResult>,
    ) -> RepositoryResult<()> {
        let mut projects = self.projects.lock()?;
        let record = projects
            .get_mut(project_id)
            .ok_or_else(|| Self::not_found(project_id))?;

        for result in results {
            let key = (result.sample_id.clone(), result.check_type);
            match record.result_index.get(&key) {
                Some(&idx) => record.results[idx] = result,
                None => {
                    record.result_index.insert(key, record.results.len());
                    record.results.push(result);
                }
            }
        }
        Ok(())
    }

    async fn list_check_results(
        &self,
        project_id: &str,
    ) -> RepositoryResult<Vec<QualityCheckResult>> {
        let projects = self.projects.lock()?;
        let record = projects
            .get(project_id)
            .ok_or_else(|| Self::not_found(project_id))?;
        Ok(record.results.clone())
    }

    async fn attach_corrections(
        &self,
        project_id: &str,
        corrections: Vec<SampleCorrection>,
    ) -> RepositoryResult<()> {
        let mut projects = self.projects.lock()?;
        let record = projects
            .get_mut(project_id)
            .ok_or_else(|| Self::not_found(project_id))?;

        for correction in corrections {
            let sample = record
                .samples
                .iter_mut()
                .find(|s| s.sample_id == correction.sample_id)
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "Sample".to_string(),
                    id: correction.sample_id.clone(),
                })?;
            let value = CorrectedConcentration::from(&correction);
            sample.corrected.insert(correction.element, value);
        }
        Ok(())
    }
}
