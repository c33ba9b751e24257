use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::device_info::DeviceInfo;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PersonKind {
    Student,
    Teacher,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// Addresses every session a person has at one center on one logical day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub kind: PersonKind,
    pub person_id: String,
    pub center_code: String,
    pub date: NaiveDate,
}

/// Where an event happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CenterRef {
    pub code: String,
    pub name: Option<String>,
    pub branch_code: Option<String>,
    pub branch_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "T101")]
    pub person_id: String,
    #[schema(example = "Alice")]
    pub person_name: String,
    pub person_kind: PersonKind,
    #[schema(example = "WX01")]
    pub center_code: String,
    pub center_name: Option<String>,
    pub branch_code: Option<String>,
    pub branch_name: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2026-01-01T01:00:00Z", format = "date-time", value_type = Option<String>)]
    pub check_in: Option<DateTime<Utc>>,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = Option<String>)]
    pub check_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    #[schema(example = "nfc_card_number")]
    pub method: String,
    #[schema(value_type = Object)]
    pub device_info: DeviceInfo,
    pub notes: String,
    pub reason: Option<String>,
    pub detail: Option<String>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Checked in and not yet checked out.
    pub fn is_open(&self) -> bool {
        self.check_in.is_some() && self.check_out.is_none()
    }
}

/// A record before the store has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub person_id: String,
    pub person_name: String,
    pub person_kind: PersonKind,
    pub center: CenterRef,
    pub date: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    pub method: String,
    pub device_info: DeviceInfo,
    pub notes: String,
    pub reason: Option<String>,
    pub detail: Option<String>,
}

/// Fields written when an open session is closed.
#[derive(Debug, Clone)]
pub struct SessionClose {
    pub check_out: DateTime<Utc>,
    pub device_info: DeviceInfo,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct AttendanceFilter {
    pub kind: PersonKind,
    pub center_code: Option<String>,
    pub person_id: Option<String>,
    pub name_contains: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Clamps to page >= 1 and 1..=MAX_PAGE_SIZE rows.
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }

    pub fn total_pages(&self, total: i64) -> u64 {
        let total = total.max(0) as u64;
        total.div_ceil(self.page_size)
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}
