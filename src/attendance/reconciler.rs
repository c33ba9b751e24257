use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{info, instrument, warn};

use crate::attendance::locks::SessionLocks;
use crate::error::AppError;
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, CenterRef, NewAttendance, PersonKind, SessionClose,
    SessionKey,
};
use crate::model::device_info::{self, DeviceSnapshot};
use crate::store::AttendanceStore;
use crate::utils::clock::BusinessClock;

// Re-reads allowed when another writer closes the session between our read and write
const MAX_ATTEMPTS: usize = 3;

/// A check event for one person. Whether it opens or closes a session is
/// decided from stored state, never from the caller.
#[derive(Debug, Clone)]
pub struct ScanEvent {
    pub kind: PersonKind,
    pub person_id: String,
    pub person_name: String,
    pub center: CenterRef,
    pub at: DateTime<Utc>,
    pub method: String,
    pub device: DeviceSnapshot,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    CheckIn,
    CheckOut,
    MarkAbsence,
}

impl SessionAction {
    pub fn label(self) -> &'static str {
        match self {
            SessionAction::CheckIn => "签到",
            SessionAction::CheckOut => "签退",
            SessionAction::MarkAbsence => "标记缺席",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub action: SessionAction,
    pub record: AttendanceRecord,
    /// 1-based index of the session within the day.
    pub session_number: usize,
}

pub fn append_note(existing: &str, note: &str) -> String {
    match (existing.trim().is_empty(), note.trim().is_empty()) {
        (true, _) => note.trim().to_string(),
        (false, true) => existing.to_string(),
        (false, false) => format!("{}; {}", existing, note.trim()),
    }
}

fn sequence_marker(session_number: usize) -> String {
    format!("第{}次", session_number)
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn AttendanceStore>,
    locks: SessionLocks,
    clock: BusinessClock,
}

impl Reconciler {
    pub fn new(store: Arc<dyn AttendanceStore>, locks: SessionLocks, clock: BusinessClock) -> Self {
        Self { store, locks, clock }
    }

    pub fn session_key(&self, event: &ScanEvent) -> SessionKey {
        SessionKey {
            kind: event.kind,
            person_id: event.person_id.clone(),
            center_code: event.center.code.clone(),
            date: self.clock.logical_date(event.at),
        }
    }

    /// Opens a session when none is open for the day, otherwise closes the
    /// open one.
    #[instrument(
        name = "reconcile",
        skip(self, event),
        fields(kind = %event.kind, person_id = %event.person_id, center = %event.center.code)
    )]
    pub async fn apply(&self, mut event: ScanEvent) -> Result<Outcome, AppError> {
        // stored times keep microseconds; compare at the same precision
        event.at = event.at.trunc_subsecs(6);
        let key = self.session_key(&event);
        let _guard = self.locks.acquire(&key).await;

        for attempt in 1..=MAX_ATTEMPTS {
            let sessions = self
                .store
                .sessions_for_day(&key)
                .await
                .map_err(AppError::store_read)?;

            let latest = match sessions.first() {
                Some(latest) if latest.is_open() => latest,
                _ => return self.open(&key, &event, sessions.len() + 1).await,
            };

            if let Some(opened_at) = latest.check_in {
                if event.at <= opened_at {
                    info!(%opened_at, at = %event.at, "Duplicate scan rejected");
                    return Err(AppError::DuplicateScan { opened_at });
                }
            }

            let close = SessionClose {
                check_out: event.at,
                device_info: device_info::with_check_out(&latest.device_info, event.device.clone()),
                notes: append_note(
                    &append_note(&latest.notes, &format!("{} 签退", event.method)),
                    event.notes.as_deref().unwrap_or(""),
                ),
            };

            match self
                .store
                .close_session(latest.id, close)
                .await
                .map_err(AppError::store_write)?
            {
                Some(record) => {
                    info!(record_id = record.id, "Session closed");
                    return Ok(Outcome {
                        action: SessionAction::CheckOut,
                        record,
                        session_number: sessions.len(),
                    });
                }
                None => warn!(attempt, record_id = latest.id, "Session closed concurrently, re-reading"),
            }
        }

        Err(AppError::StoreWriteFailure(format!(
            "session for {} kept changing after {} attempts",
            key.person_id, MAX_ATTEMPTS
        )))
    }

    async fn open(
        &self,
        key: &SessionKey,
        event: &ScanEvent,
        session_number: usize,
    ) -> Result<Outcome, AppError> {
        let mut notes = append_note(
            event.notes.as_deref().unwrap_or(""),
            &format!("{} 签到", event.method),
        );
        if session_number > 1 {
            notes = format!("{} ({})", notes, sequence_marker(session_number));
        }

        let record = self
            .store
            .insert(NewAttendance {
                person_id: event.person_id.clone(),
                person_name: event.person_name.clone(),
                person_kind: event.kind,
                center: event.center.clone(),
                date: key.date,
                check_in: Some(event.at),
                status: AttendanceStatus::Present,
                method: event.method.clone(),
                device_info: event.device.clone().into_map(),
                notes,
                reason: None,
                detail: None,
            })
            .await
            .map_err(AppError::store_write)?;

        info!(record_id = record.id, session_number, "Session opened");
        Ok(Outcome {
            action: SessionAction::CheckIn,
            record,
            session_number,
        })
    }
}
