// ==========================================
// ICP 分析质控系统 - 字段映射器实现
// ==========================================
// 输入格式: ICP 长表（每行 = 一个样品 × 一个元素）
// 职责: 源字段 → 标准字段映射 + 类型转换 + 按样品聚合
// 分组: 有 Sample Id 列按 id 聚合；否则标签变化或元素重复即开始新样品
// ==========================================

use crate::domain::sample::{ElementReading, Sample};
use crate::domain::types::SampleType;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashMap};

// ==========================================
// 标准字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceField {
    SampleId,
    SolutionLabel,
    SampleType,
    Weight,
    Volume,
    DilutionFactor,
    Element,
    Intensity,
    Certified,
    MeasuredAt,
}

impl SourceField {
    /// 规范化后的列名别名
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            SourceField::SampleId => &["sampleid", "样品编号"],
            SourceField::SolutionLabel => &["solutionlabel", "label", "样品名称"],
            SourceField::SampleType => &["type", "sampletype", "样品类型"],
            SourceField::Weight => &["weight", "mass", "称样量"],
            SourceField::Volume => &["volume", "定容体积"],
            SourceField::DilutionFactor => &["df", "dilutionfactor", "dilution", "稀释倍数"],
            SourceField::Element => &["element", "元素"],
            SourceField::Intensity => &["intensity", "int", "强度"],
            SourceField::Certified => &["certified", "certifiedvalue", "认定值"],
            SourceField::MeasuredAt => &["time", "measuredat", "测量时间"],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SourceField::SampleId => "Sample Id",
            SourceField::SolutionLabel => "Solution Label",
            SourceField::SampleType => "Type",
            SourceField::Weight => "Weight",
            SourceField::Volume => "Volume",
            SourceField::DilutionFactor => "DF",
            SourceField::Element => "Element",
            SourceField::Intensity => "Intensity",
            SourceField::Certified => "Certified",
            SourceField::MeasuredAt => "Time",
        }
    }
}

/// 列名规范化: 小写，去掉空白 / 下划线 / 连字符
fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// ==========================================
// MappedRow - 单行映射结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub row_number: usize,
    pub sample_id: Option<String>,
    pub solution_label: String,
    pub sample_type: SampleType,
    pub weight: Option<f64>,
    pub volume: Option<f64>,
    pub dilution_factor: Option<f64>,
    /// (element, intensity)；只有样品元数据的行为 None
    pub reading: Option<ElementReading>,
    pub certified: Option<f64>,
    pub measured_at: Option<DateTime<Utc>>,
}

// ==========================================
// SampleFieldMapper
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleFieldMapper;

impl SampleFieldMapper {
    /// 映射单行
    ///
    /// # 参数
    /// - row_number: 源文件行号（表头为第 1 行）
    pub fn map_row(&self, row: &RawRow, row_number: usize) -> ImportResult<MappedRow> {
        let solution_label = self
            .get_string(row, SourceField::SolutionLabel)
            .ok_or_else(|| ImportError::FieldMappingError {
                row: row_number,
                message: "Solution Label 为空".to_string(),
            })?;

        let sample_type = match self.get_string(row, SourceField::SampleType) {
            None => SampleType::Sample,
            Some(value) => value
                .parse::<SampleType>()
                .map_err(|message| ImportError::TypeConversionError {
                    row: row_number,
                    field: SourceField::SampleType.label().to_string(),
                    message,
                })?,
        };

        let reading = match self.get_string(row, SourceField::Element) {
            None => None,
            Some(element) => {
                let intensity = self
                    .parse_f64(row, SourceField::Intensity, row_number)?
                    .ok_or_else(|| ImportError::FieldMappingError {
                        row: row_number,
                        message: format!("元素 {} 缺少 Intensity", element),
                    })?;
                Some(ElementReading { element, intensity })
            }
        };

        Ok(MappedRow {
            row_number,
            sample_id: self.get_string(row, SourceField::SampleId),
            solution_label,
            sample_type,
            weight: self.parse_f64(row, SourceField::Weight, row_number)?,
            volume: self.parse_f64(row, SourceField::Volume, row_number)?,
            dilution_factor: self.parse_f64(row, SourceField::DilutionFactor, row_number)?,
            reading,
            certified: self.parse_f64(row, SourceField::Certified, row_number)?,
            measured_at: self.parse_datetime(row, SourceField::MeasuredAt, row_number)?,
        })
    }

    /// 提取字符串字段，按别名匹配列名
    fn get_string(&self, row: &RawRow, field: SourceField) -> Option<String> {
        let aliases = field.aliases();
        row.iter()
            .filter(|(header, _)| aliases.contains(&normalize_header(header).as_str()))
            .map(|(_, value)| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// 解析浮点数
    fn parse_f64(
        &self,
        row: &RawRow,
        field: SourceField,
        row_number: usize,
    ) -> ImportResult<Option<f64>> {
        match self.get_string(row, field) {
            None => Ok(None),
            Some(value) => match value.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(ImportError::TypeConversionError {
                    row: row_number,
                    field: field.label().to_string(),
                    message: format!("无法解析为有限浮点数: {}", value),
                }),
            },
        }
    }

    /// 解析时间（RFC3339，或 "YYYY-MM-DD HH:MM:SS" 视为 UTC）
    fn parse_datetime(
        &self,
        row: &RawRow,
        field: SourceField,
        row_number: usize,
    ) -> ImportResult<Option<DateTime<Utc>>> {
        let value = match self.get_string(row, field) {
            None => return Ok(None),
            Some(v) => v,
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&value, format) {
                return Ok(Some(naive.and_utc()));
            }
        }

        Err(ImportError::TypeConversionError {
            row: row_number,
            field: field.label().to_string(),
            message: format!("无法解析为时间: {}", value),
        })
    }
}

// ==========================================
// SampleAssembler - 行 → 样品聚合
// ==========================================
#[derive(Debug, Clone)]
struct SampleDraft {
    explicit_id: Option<String>,
    solution_label: String,
    sample_type: SampleType,
    weight: Option<f64>,
    volume: Option<f64>,
    dilution_factor: Option<f64>,
    readings: Vec<ElementReading>,
    certified: BTreeMap<String, f64>,
    measured_at: Option<DateTime<Utc>>,
}

impl SampleDraft {
    fn from_row(row: &MappedRow) -> Self {
        Self {
            explicit_id: row.sample_id.clone(),
            solution_label: row.solution_label.clone(),
            sample_type: row.sample_type,
            weight: None,
            volume: None,
            dilution_factor: None,
            readings: Vec::new(),
            certified: BTreeMap::new(),
            measured_at: None,
        }
    }

    fn has_element(&self, element: &str) -> bool {
        self.readings.iter().any(|r| r.element == element)
    }

    /// 合并一行（物理量与时间取首个非空值）
    fn absorb(&mut self, row: MappedRow) -> ImportResult<()> {
        self.weight = self.weight.or(row.weight);
        self.volume = self.volume.or(row.volume);
        self.dilution_factor = self.dilution_factor.or(row.dilution_factor);
        self.measured_at = self.measured_at.or(row.measured_at);

        if let Some(reading) = row.reading {
            if self.has_element(&reading.element) {
                return Err(ImportError::FieldMappingError {
                    row: row.row_number,
                    message: format!(
                        "样品 {} 元素 {} 重复",
                        self.solution_label, reading.element
                    ),
                });
            }
            if let Some(certified) = row.certified {
                self.certified.insert(reading.element.clone(), certified);
            }
            self.readings.push(reading);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SampleAssembler {
    project_id: String,
    sequence_offset: usize,
    drafts: Vec<SampleDraft>,
    by_id: HashMap<String, usize>,
}

impl SampleAssembler {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            sequence_offset: 0,
            drafts: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// 顺序号从 offset 开始（由仓储预留）
    pub fn starting_at(mut self, sequence_offset: usize) -> Self {
        self.sequence_offset = sequence_offset;
        self
    }

    pub fn push(&mut self, row: MappedRow) -> ImportResult<()> {
        let index = match &row.sample_id {
            Some(id) => match self.by_id.get(id) {
                Some(&index) => index,
                None => {
                    self.by_id.insert(id.clone(), self.drafts.len());
                    self.drafts.push(SampleDraft::from_row(&row));
                    self.drafts.len() - 1
                }
            },
            None => {
                let continues_last = self.drafts.last().is_some_and(|last| {
                    last.explicit_id.is_none()
                        && last.solution_label == row.solution_label
                        && row
                            .reading
                            .as_ref()
                            .map_or(true, |r| !last.has_element(&r.element))
                });
                if !continues_last {
                    self.drafts.push(SampleDraft::from_row(&row));
                }
                self.drafts.len() - 1
            }
        };

        self.drafts[index].absorb(row)
    }

    /// 已聚合的样品数
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// 生成样品（sequence_no = offset + 首次出现顺序；无时间列时 measured_at 为空）
    pub fn finish(self) -> Vec<Sample> {
        let project_id = self.project_id;
        let offset = self.sequence_offset;

        self.drafts
            .into_iter()
            .enumerate()
            .map(|(idx, draft)| (offset + idx, draft))
            .map(|(seq, draft)| Sample {
                sample_id: draft
                    .explicit_id
                    .unwrap_or_else(|| format!("{}-{:04}", project_id, seq + 1)),
                project_id: project_id.clone(),
                solution_label: draft.solution_label,
                sample_type: draft.sample_type,
                weight: draft.weight,
                volume: draft.volume,
                dilution_factor: draft.dilution_factor,
                readings: draft.readings,
                certified: draft.certified,
                measured_at: draft.measured_at,
                sequence_no: seq,
                corrected: BTreeMap::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_map_row_with_aliases() {
        let row = raw(&[
            ("Solution Label", "CRM-A"),
            ("sample_type", "CRM"),
            ("Element", "Cu63"),
            ("Intensity", "1500"),
            ("Certified Value", "1.5"),
            ("Time", "2026-01-20 08:05:00"),
        ]);

        let mapped = SampleFieldMapper.map_row(&row, 2).unwrap();
        assert_eq!(mapped.sample_type, SampleType::Standard);
        assert_eq!(mapped.certified, Some(1.5));
        assert_eq!(mapped.reading.unwrap().intensity, 1500.0);
        assert_eq!(
            mapped.measured_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 20, 8, 5, 0).unwrap())
        );
    }

    #[test]
    fn test_map_row_reports_row_number() {
        let row = raw(&[("Solution Label", "S1"), ("Weight", "abc")]);
        match SampleFieldMapper.map_row(&row, 7) {
            Err(ImportError::TypeConversionError { row, field, .. }) => {
                assert_eq!(row, 7);
                assert_eq!(field, "Weight");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let row = raw(&[("Element", "Cu63"), ("Intensity", "1")]);
        assert!(matches!(
            SampleFieldMapper.map_row(&row, 3),
            Err(ImportError::FieldMappingError { row: 3, .. })
        ));
    }

    #[test]
    fn test_assembler_groups_by_label_and_repeat() {
        let mapper = SampleFieldMapper;
        let rows = vec![
            raw(&[("Solution Label", "S1"), ("Weight", "0.5"), ("Element", "Cu63"), ("Intensity", "10")]),
            raw(&[("Solution Label", "S1"), ("Element", "Zn66"), ("Intensity", "20")]),
            // 同标签但元素重复 → 新样品（重复进样）
            raw(&[("Solution Label", "S1"), ("Element", "Cu63"), ("Intensity", "11")]),
            raw(&[("Solution Label", "S2"), ("Element", "Cu63"), ("Intensity", "12")]),
        ];

        let mut assembler = SampleAssembler::new("P1");
        for (idx, row) in rows.iter().enumerate() {
            assembler.push(mapper.map_row(row, idx + 2).unwrap()).unwrap();
        }
        let samples = assembler.finish();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].sample_id, "P1-0001");
        assert_eq!(samples[0].readings.len(), 2);
        assert_eq!(samples[0].weight, Some(0.5));
        assert_eq!(samples[1].solution_label, "S1");
        assert_eq!(samples[2].sequence_no, 2);
        assert_eq!(samples[2].measured_at, None);
    }

    #[test]
    fn test_assembler_explicit_id_rejects_duplicate_element() {
        let mapper = SampleFieldMapper;
        let mut assembler = SampleAssembler::new("P1");
        let first = raw(&[("Sample Id", "X"), ("Solution Label", "S1"), ("Element", "Cu63"), ("Intensity", "1")]);
        let second = raw(&[("Sample Id", "X"), ("Solution Label", "S1"), ("Element", "Cu63"), ("Intensity", "2")]);

        assembler.push(mapper.map_row(&first, 2).unwrap()).unwrap();
        let err = assembler.push(mapper.map_row(&second, 3).unwrap()).unwrap_err();
        assert!(matches!(err, ImportError::FieldMappingError { row: 3, .. }));
    }

    #[test]
    fn test_assembler_offset_and_optional_time() {
        let mapper = SampleFieldMapper;
        let rows = vec![
            raw(&[("Solution Label", "S1"), ("Element", "Cu63"), ("Intensity", "10"), ("Time", "2026-01-20 08:05:00")]),
            raw(&[("Solution Label", "S2"), ("Element", "Cu63"), ("Intensity", "12")]),
        ];

        let mut assembler = SampleAssembler::new("P1");
        for (idx, row) in rows.iter().enumerate() {
            assembler.push(mapper.map_row(row, idx + 2).unwrap()).unwrap();
        }
        let samples = assembler.starting_at(5).finish();

        assert_eq!(samples[0].sample_id, "P1-0006");
        assert_eq!(samples[0].sequence_no, 5);
        assert_eq!(
            samples[0].measured_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 20, 8, 5, 0).unwrap())
        );
        assert_eq!(samples[1].sequence_no, 6);
        assert_eq!(samples[1].measured_at, None);
    }
}
