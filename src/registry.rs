//! Source-type descriptors for every supported spreadsheet export.
//!
//! The registry is an immutable value built once with [`Registry::builtin`]
//! and handed to the orchestrator and the transformers. Destination table and
//! column names are a fixed contract with downstream analytics.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::UploadError;

/// Extensions accepted for uploads (compared case-insensitively).
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceType {
    Tag,
    Claim,
    Organization,
    Meal,
    KnoxApproval,
    KnoxMail,
    KnoxPims,
    Eam,
    Equis,
    Lams,
    Mes,
    Mdm,
}

impl SourceType {
    pub const ALL: [SourceType; 12] = [
        SourceType::Tag,
        SourceType::Claim,
        SourceType::Organization,
        SourceType::Meal,
        SourceType::KnoxApproval,
        SourceType::KnoxMail,
        SourceType::KnoxPims,
        SourceType::Eam,
        SourceType::Equis,
        SourceType::Lams,
        SourceType::Mes,
        SourceType::Mdm,
    ];

    pub fn id(self) -> &'static str {
        match self {
            SourceType::Tag => "tag_data",
            SourceType::Claim => "claim_data",
            SourceType::Organization => "employees",
            SourceType::Meal => "meal_data",
            SourceType::KnoxApproval => "knox_approval",
            SourceType::KnoxMail => "knox_mail",
            SourceType::KnoxPims => "knox_pims",
            SourceType::Eam => "eam_data",
            SourceType::Equis => "equis_data",
            SourceType::Lams => "lams_data",
            SourceType::Mes => "mes_data",
            SourceType::Mdm => "mdm_data",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Serialize for SourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl FromStr for SourceType {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SourceType::ALL
            .into_iter()
            .find(|source| source.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UploadError::UnknownSourceType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(label)
    }
}

/// How a date column is stored in its destination table. Fixed per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStorage {
    /// Integer `YYYYMMDD`.
    Compact8,
    /// Integer `YYYYMMDDHHMMSS`.
    Compact14,
    /// Text `YYYY-MM-DD HH:MM:SS`.
    IsoDateTime,
}

/// Coercion policy for one destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Passed through with the loader's type.
    Keep,
    /// Rendered as text.
    Text,
    /// Plain integer identifier; unparseable values become null.
    EmployeeId,
    /// Integer already in `HHMMSS` form; never reinterpreted as a timestamp.
    TimeToken,
    /// Best-effort timestamp serialized in the given representation.
    Temporal(DateStorage),
    /// Time of day normalized to an `HHMM` integer.
    ClockTime,
    /// Work duration in minutes, `H:MM`, or digit-only minutes, as hours.
    WorkHours,
    /// Duration in minutes (number or `H:MM`).
    Minutes,
    /// Decimal hours.
    Hours,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Source header aliases in preference order. The target name is always
    /// accepted as well.
    pub sources: &'static [&'static str],
    pub target: &'static str,
    pub kind: FieldKind,
}

const fn field(sources: &'static [&'static str], target: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        sources,
        target,
        kind,
    }
}

const fn same(name: &'static [&'static str], kind: FieldKind) -> FieldSpec {
    FieldSpec {
        sources: name,
        target: name[0],
        kind,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateColumn {
    pub name: &'static str,
    pub storage: DateStorage,
}

#[derive(Debug, Clone)]
pub struct SourceTypeDescriptor {
    pub source: SourceType,
    pub label: &'static str,
    pub description: &'static str,
    pub priority: Priority,
    pub table_name: &'static str,
    pub file_pattern: &'static str,
    pub sample_columns: &'static [&'static str],
    pub fields: &'static [FieldSpec],
    pub date_column: Option<DateColumn>,
    pub employee_column: Option<&'static str>,
}

impl SourceTypeDescriptor {
    pub fn id(&self) -> &'static str {
        self.source.id()
    }

    pub fn field(&self, target: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.target == target)
    }

    pub fn target_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.target)
    }
}

use DateStorage::{Compact8, Compact14, IsoDateTime};
use FieldKind::{
    ClockTime, EmployeeId, Hours, Keep, Minutes, Temporal, Text, TimeToken, WorkHours,
};

const TAG_FIELDS: &[FieldSpec] = &[
    field(&["일자"], "ENTE_DT", Temporal(Compact8)),
    field(&["요일구분"], "DAY_GB", Keep),
    field(&["요일명"], "DAY_NM", Text),
    field(&["이름"], "NAME", Text),
    same(&["사번"], EmployeeId),
    field(&["센터"], "CENTER", Text),
    field(&["담당"], "BU", Text),
    field(&["팀"], "TEAM", Text),
    field(&["그룹"], "GROUP_A", Text),
    field(&["파트"], "PART", Text),
    same(&["출입시각"], TimeToken),
    field(&["문번호"], "DR_NO", Keep),
    field(&["문명칭"], "DR_NM", Text),
    field(&["DR구분"], "DR_GB", Text),
    field(&["출입구분"], "INOUT_GB", Text),
];

pub const CLAIM_DATE: &str = "근무일";
pub const CLAIM_EMPLOYEE_ID: &str = "사번";
pub const CLAIM_NAME: &str = "성명";
pub const CLAIM_DEPARTMENT: &str = "부서";
pub const CLAIM_GRADE: &str = "직급";
pub const CLAIM_WORK_HOURS: &str = "근무시간";
pub const CLAIM_START: &str = "시작";
pub const CLAIM_END: &str = "종료";
pub const CLAIM_EXCLUDED: &str = "제외시간";
pub const CLAIM_ATTENDANCE: &str = "근태명";
pub const CLAIM_ACTUAL_HOURS: &str = "실제근무시간";
pub const CLAIM_LEAVE_HOURS: &str = "휴가_연차";
pub const CLAIM_LEVEL: &str = "employee_level";

const CLAIM_FIELDS: &[FieldSpec] = &[
    field(&["근무일", "근무일자", "일자"], CLAIM_DATE, Temporal(IsoDateTime)),
    same(&["급여요일"], Keep),
    field(&["성명", "이름"], CLAIM_NAME, Text),
    same(&["사번"], EmployeeId),
    same(&["부서"], Text),
    same(&["직급"], Text),
    same(&["WORKSCHDTYPNM"], Keep),
    same(&["근무시간"], WorkHours),
    field(&["시작", "근무시작", "시작시간"], CLAIM_START, ClockTime),
    field(&["종료", "근무종료", "종료시간"], CLAIM_END, ClockTime),
    field(&["제외시간", "점심시간"], CLAIM_EXCLUDED, Minutes),
    field(&["근태명", "휴가"], CLAIM_ATTENDANCE, Text),
    same(&["근태코드"], Keep),
    same(&["실제근무시간"], Hours),
    same(&["휴가_연차"], Hours),
    same(&["employee_level"], Text),
];

const ORGANIZATION_FIELDS: &[FieldSpec] = &[
    same(&["사번"], EmployeeId),
    same(&["이름"], Text),
    same(&["소속"], Text),
    same(&["센터"], Text),
    same(&["담당"], Text),
    same(&["팀"], Text),
    same(&["그룹"], Text),
    same(&["직급"], Text),
    same(&["직책"], Text),
    same(&["재직상태"], Text),
];

const MEAL_FIELDS: &[FieldSpec] = &[
    same(&["취식일시"], Temporal(Compact14)),
    same(&["사번"], EmployeeId),
    same(&["이름"], Text),
    same(&["식사구분"], Text),
    same(&["배식구"], Text),
    same(&["테이크아웃"], Keep),
];

const KNOX_APPROVAL_FIELDS: &[FieldSpec] = &[
    same(&["기안일"], Temporal(Compact14)),
    same(&["기안자ID"], Text),
    same(&["기안자명"], Text),
    same(&["결재구분"], Text),
    same(&["문서번호"], Text),
    same(&["제목"], Text),
];

const KNOX_MAIL_FIELDS: &[FieldSpec] = &[
    same(&["발송일시"], Temporal(Compact14)),
    same(&["발송자ID"], Text),
    same(&["발송자명"], Text),
    same(&["수신자"], Text),
    same(&["제목"], Text),
];

const KNOX_PIMS_FIELDS: &[FieldSpec] = &[
    same(&["회의일자"], Temporal(Compact8)),
    same(&["예약자ID"], Text),
    same(&["예약자명"], Text),
    same(&["회의실"], Text),
    same(&["회의제목"], Text),
];

const EAM_FIELDS: &[FieldSpec] = &[
    same(&["로그인일시"], Temporal(Compact14)),
    same(&["사번"], EmployeeId),
    same(&["이름"], Text),
    same(&["시스템"], Text),
    same(&["기능"], Text),
];

const EQUIS_FIELDS: &[FieldSpec] = &[
    same(&["사용시작일시"], Temporal(Compact14)),
    same(&["사용종료일시"], Temporal(Compact14)),
    same(&["사번"], EmployeeId),
    same(&["이름"], Text),
    same(&["장비명"], Text),
    same(&["장비코드"], Text),
];

const LAMS_FIELDS: &[FieldSpec] = &[
    same(&["작성일시"], Temporal(Compact14)),
    same(&["사번"], EmployeeId),
    same(&["이름"], Text),
    same(&["작업유형"], Text),
    same(&["스케줄ID"], Text),
];

const MES_FIELDS: &[FieldSpec] = &[
    same(&["로그인일시"], Temporal(Compact14)),
    same(&["사번"], EmployeeId),
    same(&["이름"], Text),
    same(&["라인"], Text),
    same(&["공정"], Text),
];

const MDM_FIELDS: &[FieldSpec] = &[
    same(&["처리일시"], Temporal(Compact14)),
    same(&["사번"], EmployeeId),
    same(&["이름"], Text),
    same(&["처리구분"], Text),
    same(&["데이터유형"], Text),
];

const fn date(name: &'static str, storage: DateStorage) -> Option<DateColumn> {
    Some(DateColumn { name, storage })
}

#[derive(Debug, Clone)]
pub struct Registry {
    descriptors: Vec<SourceTypeDescriptor>,
}

impl Registry {
    /// All twelve source types, ordered by upload priority.
    pub fn builtin() -> Self {
        let descriptors = vec![
            SourceTypeDescriptor {
                source: SourceType::Tag,
                label: "Tagging Data (출입 태그)",
                description: "RFID access-control tag events",
                priority: Priority::Critical,
                table_name: "tag_data",
                file_pattern: "입출문기록*.xlsx",
                sample_columns: &["일자", "사번", "출입시각", "DR_GB"],
                fields: TAG_FIELDS,
                date_column: date("ENTE_DT", Compact8),
                employee_column: Some("사번"),
            },
            SourceTypeDescriptor {
                source: SourceType::Claim,
                label: "Claim Data (근태 신고)",
                description: "Self-reported working hours and attendance claims",
                priority: Priority::Critical,
                table_name: "claim_data",
                file_pattern: "claim_data*.xlsx",
                sample_columns: &["일자", "사번", "근무시간"],
                fields: CLAIM_FIELDS,
                date_column: date(CLAIM_DATE, IsoDateTime),
                employee_column: Some(CLAIM_EMPLOYEE_ID),
            },
            SourceTypeDescriptor {
                source: SourceType::Organization,
                label: "Employee Data (조직/직원 정보)",
                description: "Organization structure and employee master",
                priority: Priority::Critical,
                table_name: "organization_data",
                file_pattern: "*Organization*.xlsx",
                sample_columns: &["사번", "이름", "센터", "팀"],
                fields: ORGANIZATION_FIELDS,
                date_column: None,
                employee_column: Some("사번"),
            },
            SourceTypeDescriptor {
                source: SourceType::Meal,
                label: "Meal Data (식사 데이터)",
                description: "Cafeteria meal tag events",
                priority: Priority::High,
                table_name: "meal_data",
                file_pattern: "Meal_*.xlsx",
                sample_columns: &["취식일시", "사번", "테이크아웃"],
                fields: MEAL_FIELDS,
                date_column: date("취식일시", Compact14),
                employee_column: Some("사번"),
            },
            SourceTypeDescriptor {
                source: SourceType::KnoxApproval,
                label: "Knox Approval (전자결재)",
                description: "Electronic approval drafting log",
                priority: Priority::High,
                table_name: "knox_approval_data",
                file_pattern: "Knox_approval*.xlsx",
                sample_columns: &["기안일", "기안자ID", "결재구분"],
                fields: KNOX_APPROVAL_FIELDS,
                date_column: date("기안일", Compact14),
                employee_column: Some("기안자ID"),
            },
            SourceTypeDescriptor {
                source: SourceType::KnoxMail,
                label: "Knox Mail (메일)",
                description: "Outgoing mail log",
                priority: Priority::High,
                table_name: "knox_mail_data",
                file_pattern: "Knox_mail*.xlsx",
                sample_columns: &["발송일시", "발송자ID"],
                fields: KNOX_MAIL_FIELDS,
                date_column: date("발송일시", Compact14),
                employee_column: Some("발송자ID"),
            },
            SourceTypeDescriptor {
                source: SourceType::KnoxPims,
                label: "Knox PIMS (회의실 예약)",
                description: "Meeting room reservations",
                priority: Priority::High,
                table_name: "knox_pims_data",
                file_pattern: "Knox_PIMS*.xlsx",
                sample_columns: &["회의일자", "예약자ID"],
                fields: KNOX_PIMS_FIELDS,
                date_column: date("회의일자", Compact8),
                employee_column: Some("예약자ID"),
            },
            SourceTypeDescriptor {
                source: SourceType::Eam,
                label: "EAM (안전설비시스템)",
                description: "Safety equipment system logins",
                priority: Priority::Medium,
                table_name: "eam_data",
                file_pattern: "EAM_*.xlsx",
                sample_columns: &["로그인일시", "사번"],
                fields: EAM_FIELDS,
                date_column: date("로그인일시", Compact14),
                employee_column: Some("사번"),
            },
            SourceTypeDescriptor {
                source: SourceType::Equis,
                label: "Equis (장비관리)",
                description: "Equipment usage sessions",
                priority: Priority::Medium,
                table_name: "equis_data",
                file_pattern: "EQUIS_*.xlsx",
                sample_columns: &["사용시작일시", "사번"],
                fields: EQUIS_FIELDS,
                date_column: date("사용시작일시", Compact14),
                employee_column: Some("사번"),
            },
            SourceTypeDescriptor {
                source: SourceType::Lams,
                label: "LAMS (실험실관리)",
                description: "Laboratory schedule authoring log",
                priority: Priority::Low,
                table_name: "lams_data",
                file_pattern: "LAMS_*.xlsx",
                sample_columns: &["작성일시", "사번"],
                fields: LAMS_FIELDS,
                date_column: date("작성일시", Compact14),
                employee_column: Some("사번"),
            },
            SourceTypeDescriptor {
                source: SourceType::Mes,
                label: "MES (생산시스템)",
                description: "Production system logins",
                priority: Priority::Low,
                table_name: "mes_data",
                file_pattern: "MES_*.xlsx",
                sample_columns: &["로그인일시", "사번"],
                fields: MES_FIELDS,
                date_column: date("로그인일시", Compact14),
                employee_column: Some("사번"),
            },
            SourceTypeDescriptor {
                source: SourceType::Mdm,
                label: "MDM (마스터데이터)",
                description: "Master data maintenance log",
                priority: Priority::Low,
                table_name: "mdm_data",
                file_pattern: "MDM_*.xlsx",
                sample_columns: &["처리일시", "사번"],
                fields: MDM_FIELDS,
                date_column: date("처리일시", Compact14),
                employee_column: Some("사번"),
            },
        ];
        Self { descriptors }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceTypeDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, source: SourceType) -> Option<&SourceTypeDescriptor> {
        self.descriptors.iter().find(|d| d.source == source)
    }

    /// Looks a descriptor up by its string identifier.
    pub fn lookup(&self, id: &str) -> Result<&SourceTypeDescriptor, UploadError> {
        let source = id.parse::<SourceType>()?;
        self.get(source)
            .ok_or_else(|| UploadError::UnknownSourceType(id.to_string()))
    }
}

pub fn is_spreadsheet(file_name: &str) -> bool {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
}
