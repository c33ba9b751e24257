use crate::{
    api::{attendance, nfc},
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    pub scan: Limiter,
    pub api: Limiter,
}

impl Limiters {
    pub fn new(scan_per_min: u32, api_per_min: u32) -> Self {
        Self {
            scan: Arc::new(build_limiter(scan_per_min)),
            api: Arc::new(build_limiter(api_per_min)),
        }
    }
}

fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst are non-zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    cfg.service(
        web::scope(&config.api_prefix).configure(|scope| register(scope, limiters)),
    );
}

/// Attendance resources, relative to the API prefix.
pub fn register(cfg: &mut web::ServiceConfig, limiters: &Limiters) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::InvalidField {
            field: "body",
            reason: err.to_string(),
        }
        .into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::InvalidField {
            field: "query",
            reason: err.to_string(),
        }
        .into()
    }))
    // /teacher-attendance
    .service(
        web::resource("/teacher-attendance")
            .wrap(limiters.api.clone())
            .route(web::post().to(attendance::record_teacher_attendance))
            .route(web::get().to(attendance::list_teacher_attendance)),
    )
    // /student-attendance
    .service(
        web::resource("/student-attendance")
            .wrap(limiters.api.clone())
            .route(web::get().to(attendance::list_student_attendance)),
    )
    // /nfc-checkin
    .service(
        web::resource("/nfc-checkin")
            .wrap(limiters.scan.clone())
            .route(web::post().to(nfc::nfc_checkin)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceService;
    use crate::attendance::locks::SessionLocks;
    use crate::store::memory::MemoryStore;
    use crate::utils::clock::BusinessClock;
    use actix_web::{App, http::StatusCode, test};
    use chrono::FixedOffset;
    use serde_json::json;
    use std::time::Duration;

    #[actix_web::test]
    async fn scan_limiter_rejects_bursts() {
        let store = Arc::new(MemoryStore::new());
        let service = AttendanceService::new(
            store.clone(),
            store,
            SessionLocks::new(Duration::from_secs(60)),
            BusinessClock::new(FixedOffset::east_opt(8 * 3600).unwrap()),
            "active",
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(|cfg| register(cfg, &Limiters::new(1, 1_000))),
        )
        .await;

        let scan = || {
            test::TestRequest::post()
                .uri("/nfc-checkin")
                .peer_addr("10.0.0.7:5000".parse().unwrap())
                .set_json(json!({"payload": "S9999", "centerId": "WX01"}))
                .to_request()
        };

        let first = test::call_service(&app, scan()).await;
        assert_eq!(first.status(), StatusCode::NOT_FOUND);
        let status = match test::try_call_service(&app, scan()).await {
            Ok(resp) => resp.status(),
            Err(err) => err.as_response_error().status_code(),
        };
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }
}
