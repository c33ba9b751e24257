use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::attendance::{event_time, optional, required};
use crate::api::response::AttendanceResponse;
use crate::attendance::{AttendanceService, CardScan};
use crate::error::AppError;
use crate::model::attendance::CenterRef;
use crate::model::device_info::DeviceSnapshot;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "payload": {
        "records": [
            {"recordType": "url", "data": "https://center.example/checkin?studentId=S2001"}
        ]
    },
    "centerId": "WX01",
    "deviceId": "kiosk-1"
}))]
pub struct NfcCheckinRequest {
    /// Raw reader output: a string, a number, or an object carrying NDEF
    /// records, keystrokes, an id or a serial number.
    #[schema(value_type = Object)]
    pub payload: Option<Value>,
    pub center_id: Option<String>,
    pub center_name: Option<String>,
    pub branch_id: Option<String>,
    pub branch_name: Option<String>,
    pub timestamp: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub wifi_network: Option<String>,
    pub wifi_verified: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub network_info: Option<Value>,
}

/// Resolve a scanned card to a person and check them in or out
#[utoipa::path(
    post,
    path = "/api/nfc-checkin",
    request_body(
        content = NfcCheckinRequest,
        description = "Scanner payload and kiosk context",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Session opened or closed", body = AttendanceResponse),
        (status = 400, description = "Missing payload or centerId"),
        (status = 403, description = "Person is not active", body = Object, example = json!({
            "success": false,
            "error": "Bob is not active (status: suspended)"
        })),
        (status = 404, description = "No student or teacher matches the card", body = Object, example = json!({
            "success": false,
            "error": "No student or teacher matches the scanned card",
            "details": "S9999"
        })),
        (status = 409, description = "Scan not later than the open check-in"),
        (status = 500, description = "Record store failure")
    ),
    tag = "Attendance"
)]
#[instrument(
    name = "nfc_checkin",
    skip(service, payload),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn nfc_checkin(
    service: web::Data<AttendanceService>,
    payload: web::Json<NfcCheckinRequest>,
) -> Result<HttpResponse, AppError> {
    let req = payload.into_inner();

    let scanned = match req.payload {
        None | Some(Value::Null) => return Err(AppError::MissingField("payload")),
        Some(value) => value,
    };
    let center_code = required(&req.center_id, "centerId")?;
    let at = event_time(service.clock(), req.timestamp.as_deref())?;

    let device = DeviceSnapshot {
        device_id: optional(req.device_id),
        device_name: optional(req.device_name),
        wifi_network: optional(req.wifi_network),
        wifi_verified: req.wifi_verified,
        network_info: req.network_info,
        // method is filled in once the card source is known
        ..DeviceSnapshot::new("", at)
    };

    let (outcome, person) = service
        .scan(CardScan {
            payload: scanned,
            center: CenterRef {
                code: center_code,
                name: optional(req.center_name),
                branch_code: optional(req.branch_id),
                branch_name: optional(req.branch_name),
            },
            at,
            device,
        })
        .await?;

    info!(person_id = %person.id, action = outcome.action.label(), "Card scan reconciled");
    Ok(HttpResponse::Ok().json(AttendanceResponse::from_outcome(outcome).with_person(person)))
}
