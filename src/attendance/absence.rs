use chrono::NaiveDate;
use tracing::info;

use crate::error::AppError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, CenterRef, NewAttendance, PersonKind};
use crate::model::device_info::DeviceSnapshot;
use crate::store::AttendanceStore;

pub const ABSENCE_METHOD: &str = "teacher_mark_absence";

/// A teacher's assertion that a student was absent on `date`.
#[derive(Debug, Clone)]
pub struct AbsenceMark {
    pub student_id: String,
    pub student_name: String,
    pub reason: String,
    pub detail: Option<String>,
    pub date: NaiveDate,
    pub center: CenterRef,
    pub teacher_id: String,
    pub teacher_name: String,
    pub device: DeviceSnapshot,
}

/// Writes one absent record. Existing records for the day are neither read
/// nor changed, and repeated marks are not merged.
pub async fn mark_absence(
    store: &dyn AttendanceStore,
    mark: AbsenceMark,
) -> Result<AttendanceRecord, AppError> {
    let notes = format!("{}({}) 标记缺席", mark.teacher_name, mark.teacher_id);

    let record = store
        .insert(NewAttendance {
            person_id: mark.student_id,
            person_name: mark.student_name,
            person_kind: PersonKind::Student,
            center: mark.center,
            date: mark.date,
            check_in: None,
            status: AttendanceStatus::Absent,
            method: ABSENCE_METHOD.to_string(),
            device_info: mark.device.into_map(),
            notes,
            reason: Some(mark.reason),
            detail: mark.detail,
        })
        .await
        .map_err(AppError::store_write)?;

    info!(record_id = record.id, student_id = %record.person_id, date = %record.date, "Absence marked");
    Ok(record)
}
