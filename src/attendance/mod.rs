pub mod absence;
pub mod locks;
pub mod reconciler;

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::attendance::absence::AbsenceMark;
use crate::attendance::locks::SessionLocks;
use crate::attendance::reconciler::{Outcome, Reconciler, ScanEvent};
use crate::error::AppError;
use crate::model::attendance::{AttendanceFilter, AttendanceRecord, CenterRef, Page, PageRequest};
use crate::model::device_info::DeviceSnapshot;
use crate::model::person::PersonMatch;
use crate::scan::payload::ScanPayload;
use crate::scan::resolver::IdentifierResolver;
use crate::store::{AttendanceStore, PersonDirectory};
use crate::utils::clock::BusinessClock;

/// A card scan at a kiosk, before the card is tied to a person.
#[derive(Debug, Clone)]
pub struct CardScan {
    pub payload: Value,
    pub center: CenterRef,
    pub at: chrono::DateTime<chrono::Utc>,
    pub device: DeviceSnapshot,
}

/// Scanned payload as the reader sent it; strings without JSON quoting.
fn raw_payload(payload: &Value) -> String {
    match payload {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Everything the HTTP layer needs, shared across workers.
#[derive(Clone)]
pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
    resolver: IdentifierResolver,
    reconciler: Reconciler,
    clock: BusinessClock,
    active_status: String,
}

impl AttendanceService {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        directory: Arc<dyn PersonDirectory>,
        locks: SessionLocks,
        clock: BusinessClock,
        active_status: impl Into<String>,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(store.clone(), locks, clock),
            resolver: IdentifierResolver::new(directory),
            store,
            clock,
            active_status: active_status.into(),
        }
    }

    pub fn clock(&self) -> &BusinessClock {
        &self.clock
    }

    pub async fn check(&self, event: ScanEvent) -> Result<Outcome, AppError> {
        self.reconciler.apply(event).await
    }

    pub async fn mark_absence(&self, mark: AbsenceMark) -> Result<AttendanceRecord, AppError> {
        absence::mark_absence(&*self.store, mark).await
    }

    /// Resolves the card, rejects inactive people, then reconciles.
    pub async fn scan(&self, scan: CardScan) -> Result<(Outcome, PersonMatch), AppError> {
        let not_found = || AppError::NotFound {
            scanned: raw_payload(&scan.payload),
        };

        let candidate = ScanPayload::from_value(&scan.payload)
            .and_then(|payload| payload.candidate())
            .ok_or_else(not_found)?;

        let person = match self
            .resolver
            .resolve(&candidate.value)
            .await
            .map_err(AppError::store_read)?
        {
            Some(person) => person,
            None => {
                info!(candidate = %candidate.value, source = ?candidate.source, "No person for scanned card");
                return Err(not_found());
            }
        };

        if person.status != self.active_status {
            warn!(person_id = %person.id, status = %person.status, "Inactive person scanned");
            return Err(AppError::PersonInactive {
                name: person.name,
                status: person.status,
            });
        }
        if person.center_code != scan.center.code {
            info!(
                person_id = %person.id,
                home_center = %person.center_code,
                center = %scan.center.code,
                "Scan at a center other than the person's home center"
            );
        }

        let method = candidate.source.method();
        let mut device = scan.device;
        device.method = method.to_string();

        let outcome = self
            .check(ScanEvent {
                kind: person.kind,
                person_id: person.id.clone(),
                person_name: person.name.clone(),
                center: scan.center,
                at: scan.at,
                method: method.to_string(),
                device,
                notes: None,
            })
            .await?;

        Ok((outcome, PersonMatch::from(&person)))
    }

    pub async fn list(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>, AppError> {
        self.store
            .list(filter, page)
            .await
            .map_err(AppError::store_read)
    }
}
