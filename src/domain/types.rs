// ==========================================
// ICP 分析质控系统 - 领域类型定义
// ==========================================
// 职责: 样品类型 / 质控检查类型 / 检查状态 / 导入任务状态
// 序列化格式: 与外部表示层保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 样品类型 (Sample Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    Sample,   // 普通样品
    Standard, // 标准/参考物质 (CRM)
    Blank,    // 空白
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleType::Sample => write!(f, "Sample"),
            SampleType::Standard => write!(f, "Standard"),
            SampleType::Blank => write!(f, "Blank"),
        }
    }
}

impl std::str::FromStr for SampleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sample" | "samp" | "" => Ok(SampleType::Sample),
            "standard" | "std" | "crm" | "reference" => Ok(SampleType::Standard),
            "blank" | "blk" => Ok(SampleType::Blank),
            other => Err(format!("未知样品类型: {}", other)),
        }
    }
}

// ==========================================
// 质控检查类型 (Check Type)
// ==========================================
// 封闭枚举: 新增检查 = 新增变体 + 规则函数
// 顺序即全量运行顺序，DriftCalibration 必须最后
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckType {
    WeightCheck,
    VolumeCheck,
    DilutionFactorCheck,
    EmptyCheck,
    CrmCheck,
    DriftCalibration,
}

impl CheckType {
    /// 全量运行顺序
    pub const RUN_ORDER: [CheckType; 6] = [
        CheckType::WeightCheck,
        CheckType::VolumeCheck,
        CheckType::DilutionFactorCheck,
        CheckType::EmptyCheck,
        CheckType::CrmCheck,
        CheckType::DriftCalibration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::WeightCheck => "WeightCheck",
            CheckType::VolumeCheck => "VolumeCheck",
            CheckType::DilutionFactorCheck => "DilutionFactorCheck",
            CheckType::EmptyCheck => "EmptyCheck",
            CheckType::CrmCheck => "CRMCheck",
            CheckType::DriftCalibration => "DriftCalibration",
        }
    }

    /// 是否依赖校准曲线
    pub fn needs_curves(&self) -> bool {
        matches!(self, CheckType::CrmCheck | CheckType::DriftCalibration)
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CheckType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], "").as_str() {
            "weightcheck" | "weight" => Ok(CheckType::WeightCheck),
            "volumecheck" | "volume" => Ok(CheckType::VolumeCheck),
            "dilutionfactorcheck" | "dilutionfactor" | "df" => Ok(CheckType::DilutionFactorCheck),
            "emptycheck" | "empty" => Ok(CheckType::EmptyCheck),
            "crmcheck" | "crm" => Ok(CheckType::CrmCheck),
            "driftcalibration" | "drift" => Ok(CheckType::DriftCalibration),
            _ => Err(format!("未知检查类型: {}", s)),
        }
    }
}

// ==========================================
// 检查状态 (Check Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckStatus {
    Pass,
    Fail,
    Warning,
    Pending,
    NotImplemented,
}

impl CheckStatus {
    /// 严重程度（用于多元素结果取最差）
    pub fn severity(&self) -> u8 {
        match self {
            CheckStatus::Pass => 0,
            CheckStatus::Pending => 1,
            CheckStatus::NotImplemented => 2,
            CheckStatus::Warning => 3,
            CheckStatus::Fail => 4,
        }
    }

    pub fn worst(self, other: CheckStatus) -> CheckStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "Pass"),
            CheckStatus::Fail => write!(f, "Fail"),
            CheckStatus::Warning => write!(f, "Warning"),
            CheckStatus::Pending => write!(f, "Pending"),
            CheckStatus::NotImplemented => write!(f, "NotImplemented"),
        }
    }
}

// ==========================================
// 导入任务状态 (Import Job State)
// ==========================================
// Pending → Running → Completed / Failed，终态不可再转移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportJobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ImportJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportJobState::Completed | ImportJobState::Failed)
    }
}

impl fmt::Display for ImportJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportJobState::Pending => write!(f, "PENDING"),
            ImportJobState::Running => write!(f, "RUNNING"),
            ImportJobState::Completed => write!(f, "COMPLETED"),
            ImportJobState::Failed => write!(f, "FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_type_parse() {
        assert_eq!("CRMCheck".parse::<CheckType>().unwrap(), CheckType::CrmCheck);
        assert_eq!("drift_calibration".parse::<CheckType>().unwrap(), CheckType::DriftCalibration);
        assert!("unknown".parse::<CheckType>().is_err());
    }

    #[test]
    fn test_run_order_drift_last() {
        assert_eq!(CheckType::RUN_ORDER.last(), Some(&CheckType::DriftCalibration));
    }

    #[test]
    fn test_status_worst() {
        assert_eq!(CheckStatus::Pass.worst(CheckStatus::Warning), CheckStatus::Warning);
        assert_eq!(CheckStatus::Fail.worst(CheckStatus::Warning), CheckStatus::Fail);
    }
}
