use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::response::{AttendanceListResponse, AttendanceResponse};
use crate::attendance::AttendanceService;
use crate::attendance::absence::{ABSENCE_METHOD, AbsenceMark};
use crate::attendance::reconciler::ScanEvent;
use crate::error::AppError;
use crate::model::attendance::{
    AttendanceFilter, AttendanceStatus, CenterRef, PageRequest, PersonKind,
};
use crate::model::device_info::DeviceSnapshot;
use crate::utils::clock::{BusinessClock, parse_date};

pub const MARK_ABSENCE: &str = "mark-absence";
const DEFAULT_METHOD: &str = "manual";

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "teacherId": "T101",
    "teacherName": "Alice",
    "centerId": "WX01",
    "type": "check-in",
    "timestamp": "2026-01-01 09:00:00",
    "deviceId": "kiosk-1",
    "method": "manual"
}))]
pub struct TeacherAttendanceRequest {
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
    pub center_id: Option<String>,
    pub center_name: Option<String>,
    pub branch_id: Option<String>,
    pub branch_name: Option<String>,
    /// `check-in`, `check-out` or `mark-absence`. Only `mark-absence` changes
    /// routing; check-in versus check-out is decided from stored state.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub timestamp: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub method: Option<String>,
    pub wifi_network: Option<String>,
    pub wifi_verified: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub network_info: Option<Value>,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub absence_reason: Option<String>,
    pub absence_detail: Option<String>,
    pub absence_date: Option<String>,
    pub notes: Option<String>,
}

pub enum TeacherCommand {
    Check(ScanEvent),
    MarkAbsence(AbsenceMark),
}

pub(crate) fn required(value: &Option<String>, field: &'static str) -> Result<String, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(AppError::MissingField(field))
}

pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn event_time(
    clock: &BusinessClock,
    raw: Option<&str>,
) -> Result<chrono::DateTime<chrono::Utc>, AppError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(clock.now()),
        Some(raw) => clock.parse_timestamp(raw).ok_or_else(|| AppError::InvalidField {
            field: "timestamp",
            reason: format!("unrecognised timestamp {:?}", raw),
        }),
    }
}

impl TeacherAttendanceRequest {
    /// Validates the body before anything touches the store.
    pub fn into_command(self, clock: &BusinessClock) -> Result<TeacherCommand, AppError> {
        let teacher_id = required(&self.teacher_id, "teacherId")?;
        let teacher_name = required(&self.teacher_name, "teacherName")?;
        let center_code = required(&self.center_id, "centerId")?;
        let event_type = required(&self.event_type, "type")?;

        let at = event_time(clock, self.timestamp.as_deref())?;
        let center = CenterRef {
            code: center_code,
            name: optional(self.center_name),
            branch_code: optional(self.branch_id),
            branch_name: optional(self.branch_name),
        };

        if event_type == MARK_ABSENCE {
            let student_id = required(&self.student_id, "studentId")?;
            let student_name = required(&self.student_name, "studentName")?;
            let reason = required(&self.absence_reason, "absenceReason")?;
            let raw_date = required(&self.absence_date, "absenceDate")?;
            let date = parse_date(&raw_date).ok_or_else(|| AppError::InvalidField {
                field: "absenceDate",
                reason: format!("expected YYYY-MM-DD, got {:?}", raw_date),
            })?;

            let mut device = DeviceSnapshot::new(ABSENCE_METHOD, at);
            device.device_id = optional(self.device_id);
            device.device_name = optional(self.device_name);

            return Ok(TeacherCommand::MarkAbsence(AbsenceMark {
                student_id,
                student_name,
                reason,
                detail: optional(self.absence_detail),
                date,
                center,
                teacher_id,
                teacher_name,
                device,
            }));
        }

        let method = optional(self.method).unwrap_or_else(|| DEFAULT_METHOD.to_string());
        let device = DeviceSnapshot {
            device_id: optional(self.device_id),
            device_name: optional(self.device_name),
            wifi_network: optional(self.wifi_network),
            wifi_verified: self.wifi_verified,
            network_info: self.network_info,
            ..DeviceSnapshot::new(&method, at)
        };

        Ok(TeacherCommand::Check(ScanEvent {
            kind: PersonKind::Teacher,
            person_id: teacher_id,
            person_name: teacher_name,
            center,
            at,
            method,
            device,
            notes: optional(self.notes),
        }))
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAttendanceQuery {
    /// Center code
    pub center: Option<String>,
    pub teacher_id: Option<String>,
    /// Substring of the teacher's name
    pub teacher_name: Option<String>,
    /// YYYY-MM-DD
    pub date: Option<String>,
    /// `present` or `absent`
    pub status: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceQuery {
    pub center: Option<String>,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

struct ListParams {
    center: Option<String>,
    person_id: Option<String>,
    name: Option<String>,
    date: Option<String>,
    status: Option<String>,
    page: Option<u64>,
    page_size: Option<u64>,
}

impl ListParams {
    fn into_filter(self, kind: PersonKind) -> Result<(AttendanceFilter, PageRequest), AppError> {
        let date = match optional(self.date) {
            None => None,
            Some(raw) => Some(parse_date(&raw).ok_or_else(|| AppError::InvalidField {
                field: "date",
                reason: format!("expected YYYY-MM-DD, got {:?}", raw),
            })?),
        };
        let status = match optional(self.status) {
            None => None,
            Some(raw) => Some(raw.parse::<AttendanceStatus>().map_err(|_| {
                AppError::InvalidField {
                    field: "status",
                    reason: format!("expected present or absent, got {:?}", raw),
                }
            })?),
        };

        let filter = AttendanceFilter {
            kind,
            center_code: optional(self.center),
            person_id: optional(self.person_id),
            name_contains: optional(self.name),
            date,
            status,
        };
        Ok((filter, PageRequest::new(self.page, self.page_size)))
    }
}

async fn list(
    service: &AttendanceService,
    kind: PersonKind,
    params: ListParams,
) -> Result<HttpResponse, AppError> {
    let (filter, page) = params.into_filter(kind)?;
    let result = service.list(&filter, page).await?;
    Ok(HttpResponse::Ok().json(AttendanceListResponse::new(result, page)))
}

/// Record a teacher check event or mark a student absent
#[utoipa::path(
    post,
    path = "/api/teacher-attendance",
    request_body(
        content = TeacherAttendanceRequest,
        description = "Check event or absence mark",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Session opened, closed, or absence recorded", body = AttendanceResponse),
        (status = 400, description = "Missing or invalid field", body = Object, example = json!({
            "success": false,
            "error": "Missing required field: teacherId"
        })),
        (status = 409, description = "Scan not later than the open check-in"),
        (status = 500, description = "Record store failure", body = Object, example = json!({
            "success": false,
            "error": "Record store authentication failed",
            "details": "Access denied for user"
        }))
    ),
    tag = "Attendance"
)]
#[instrument(
    name = "teacher_attendance",
    skip(service, payload),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn record_teacher_attendance(
    service: web::Data<AttendanceService>,
    payload: web::Json<TeacherAttendanceRequest>,
) -> Result<HttpResponse, AppError> {
    let command = payload.into_inner().into_command(service.clock())?;

    let response = match command {
        TeacherCommand::MarkAbsence(mark) => {
            info!(student_id = %mark.student_id, teacher_id = %mark.teacher_id, "Marking absence");
            AttendanceResponse::absence(service.mark_absence(mark).await?)
        }
        TeacherCommand::Check(event) => AttendanceResponse::from_outcome(service.check(event).await?),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// List teacher attendance records
#[utoipa::path(
    get,
    path = "/api/teacher-attendance",
    params(TeacherAttendanceQuery),
    responses(
        (status = 200, description = "Paginated teacher attendance", body = AttendanceListResponse),
        (status = 400, description = "Invalid filter"),
        (status = 500, description = "Record store failure")
    ),
    tag = "Attendance"
)]
pub async fn list_teacher_attendance(
    service: web::Data<AttendanceService>,
    query: web::Query<TeacherAttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let q = query.into_inner();
    list(
        &service,
        PersonKind::Teacher,
        ListParams {
            center: q.center,
            person_id: q.teacher_id,
            name: q.teacher_name,
            date: q.date,
            status: q.status,
            page: q.page,
            page_size: q.page_size,
        },
    )
    .await
}

/// List student attendance records
#[utoipa::path(
    get,
    path = "/api/student-attendance",
    params(StudentAttendanceQuery),
    responses(
        (status = 200, description = "Paginated student attendance", body = AttendanceListResponse),
        (status = 400, description = "Invalid filter"),
        (status = 500, description = "Record store failure")
    ),
    tag = "Attendance"
)]
pub async fn list_student_attendance(
    service: web::Data<AttendanceService>,
    query: web::Query<StudentAttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let q = query.into_inner();
    list(
        &service,
        PersonKind::Student,
        ListParams {
            center: q.center,
            person_id: q.student_id,
            name: q.student_name,
            date: q.date,
            status: q.status,
            page: q.page,
            page_size: q.page_size,
        },
    )
    .await
}
