use serde::Serialize;
use utoipa::ToSchema;

use crate::attendance::reconciler::{Outcome, SessionAction};
use crate::model::attendance::{AttendanceRecord, Page, PageRequest};
use crate::model::person::PersonMatch;

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "data": {
        "id": 1,
        "personId": "T101",
        "personName": "Alice",
        "personKind": "teacher",
        "centerCode": "WX01",
        "date": "2026-01-01",
        "checkIn": "2026-01-01T01:00:00Z",
        "checkOut": null,
        "status": "present",
        "method": "manual",
        "deviceInfo": {"deviceId": "kiosk-1", "method": "manual"},
        "notes": "manual 签到",
        "createdAt": "2026-01-01T01:00:00Z"
    },
    "action": "签到",
    "message": "Alice 签到成功"
}))]
pub struct AttendanceResponse {
    pub success: bool,
    pub data: AttendanceRecord,
    pub action: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonMatch>,
}

impl AttendanceResponse {
    pub fn from_outcome(outcome: Outcome) -> Self {
        let name = &outcome.record.person_name;
        let message = match outcome.action {
            SessionAction::CheckIn if outcome.session_number > 1 => {
                format!("{} 第{}次签到成功", name, outcome.session_number)
            }
            SessionAction::CheckIn => format!("{} 签到成功", name),
            SessionAction::CheckOut => format!("{} 签退成功", name),
            SessionAction::MarkAbsence => format!("已标记 {} 缺席", name),
        };
        Self {
            success: true,
            action: outcome.action.label().to_string(),
            message,
            data: outcome.record,
            person: None,
        }
    }

    pub fn absence(record: AttendanceRecord) -> Self {
        Self::from_outcome(Outcome {
            action: SessionAction::MarkAbsence,
            record,
            session_number: 0,
        })
    }

    pub fn with_person(mut self, person: PersonMatch) -> Self {
        self.person = Some(person);
        self
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceListResponse {
    pub success: bool,
    pub data: Vec<AttendanceRecord>,
    #[schema(example = 42)]
    pub total: i64,
    #[schema(example = 20)]
    pub count: usize,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 20)]
    pub page_size: u64,
    #[schema(example = 3)]
    pub total_pages: u64,
}

impl AttendanceListResponse {
    pub fn new(page: Page<AttendanceRecord>, request: PageRequest) -> Self {
        Self {
            success: true,
            count: page.items.len(),
            total_pages: request.total_pages(page.total),
            total: page.total,
            page: request.page,
            page_size: request.page_size,
            data: page.items,
        }
    }
}
