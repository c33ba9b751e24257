use crate::api::attendance::TeacherAttendanceRequest;
use crate::api::nfc::NfcCheckinRequest;
use crate::api::response::{AttendanceListResponse, AttendanceResponse};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, PersonKind};
use crate::model::person::PersonMatch;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Center Attendance API",
        version = "1.0.0",
        description = r#"
## Center Attendance

Check-in and check-out tracking for students and teachers across learning centers.

### 🔹 Key Features
- **Card scans**
  - NFC URL/text records, raw card numbers and keyboard-wedge readers
- **Session reconciliation**
  - The stored state of the day decides check-in versus check-out
  - Several sessions per person per day
- **Absence marking**
  - Teachers record a student's absence with a reason
- **Listing**
  - Filter by center, person, date and status, paginated

### 📦 Response Format
- Success: `{ "success": true, "data": ..., "action": ..., "message": ... }`
- Error: `{ "success": false, "error": ..., "details": ... }`
"#,
    ),
    paths(
        crate::api::attendance::record_teacher_attendance,
        crate::api::attendance::list_teacher_attendance,
        crate::api::attendance::list_student_attendance,

        crate::api::nfc::nfc_checkin
    ),
    components(
        schemas(
            TeacherAttendanceRequest,
            NfcCheckinRequest,
            AttendanceResponse,
            AttendanceListResponse,
            AttendanceRecord,
            AttendanceStatus,
            PersonKind,
            PersonMatch
        )
    ),
    tags(
        (name = "Attendance", description = "Attendance scanning, absence and listing APIs"),
    )
)]
pub struct ApiDoc;
