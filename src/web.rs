use std::collections::BTreeMap;
use std::sync::Mutex;

use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::CycleConfig;
use crate::parser::{read_exceptions, read_performers};
use crate::report::Reports;
use crate::schedule::{assign, MonthCapacity, RunResult, SchoolExceptions};

/// Latest run and its inputs. Every upload builds a fresh run context.
pub struct AppState {
    pub config: CycleConfig,
    pub exceptions: Mutex<SchoolExceptions>,
    pub latest: Mutex<Option<LatestRun>>,
    pub admin_password: String,
}

pub struct LatestRun {
    pub result: RunResult,
    pub reports: Reports,
}

impl AppState {
    pub fn new(config: CycleConfig, exceptions: SchoolExceptions, admin_password: String) -> Self {
        Self {
            config,
            exceptions: Mutex::new(exceptions),
            latest: Mutex::new(None),
            admin_password,
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Serialize)]
pub struct MonthStats {
    label: String,
    assigned: usize,
    capacity: MonthCapacity,
}

#[derive(Serialize)]
pub struct StatsResponse {
    evaluated: usize,
    assigned: usize,
    declined: usize,
    months: BTreeMap<String, MonthStats>,
}

fn authorized(req: &HttpRequest, state: &AppState) -> bool {
    req.headers()
        .get("X-Admin-Password")
        .and_then(|v| v.to_str().ok())
        .map(|password| password == state.admin_password)
        .unwrap_or(false)
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Unauthorized"}))
}

fn lock_failed() -> actix_web::Error {
    actix_web::error::ErrorInternalServerError("state lock poisoned")
}

async fn admin_login(req: web::Json<LoginRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    if req.password == state.admin_password {
        Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
    } else {
        Ok(HttpResponse::Unauthorized().json(serde_json::json!({"success": false, "error": "Invalid password"})))
    }
}

// Replaces the school exceptions table used by later uploads.
async fn upload_exceptions(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }

    match read_exceptions(&body[..]) {
        Ok(exceptions) => {
            let count = exceptions.len();
            *state.exceptions.lock().map_err(|_| lock_failed())? = exceptions;
            info!(count, "school exceptions updated");
            Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "exceptions": count})))
        }
        Err(e) => Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": format!("Failed to process exceptions CSV: {}", e)
        }))),
    }
}

// Runs a new assignment over the uploaded performer CSV.
async fn upload_performers(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !authorized(&req, &state) {
        return Ok(unauthorized());
    }

    let performers = match read_performers(&body[..], &state.config) {
        Ok(performers) => performers,
        Err(e) => {
            warn!(error = %e, "rejected performer upload");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "error": format!("Failed to process CSV: {}", e)
            })));
        }
    };

    let exceptions = state.exceptions.lock().map_err(|_| lock_failed())?.clone();
    let result = assign(&state.config, exceptions, performers);
    let reports = Reports::build(&result, &state.config);
    let (assigned, declined) = (result.assigned_count(), result.declined_count());

    *state.latest.lock().map_err(|_| lock_failed())? = Some(LatestRun { result, reports });

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "assigned": assigned,
        "declined": declined
    })))
}

fn no_run() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({"error": "No assignment run available"}))
}

async fn get_assigned(state: web::Data<AppState>) -> Result<HttpResponse> {
    let latest = state.latest.lock().map_err(|_| lock_failed())?;
    match latest.as_ref() {
        Some(run) => Ok(HttpResponse::Ok().json(&run.reports.assigned)),
        None => Ok(no_run()),
    }
}

async fn get_declined(state: web::Data<AppState>) -> Result<HttpResponse> {
    let latest = state.latest.lock().map_err(|_| lock_failed())?;
    match latest.as_ref() {
        Some(run) => Ok(HttpResponse::Ok().json(&run.reports.declined)),
        None => Ok(no_run()),
    }
}

async fn get_month(month: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let latest = state.latest.lock().map_err(|_| lock_failed())?;
    let Some(run) = latest.as_ref() else {
        return Ok(no_run());
    };

    match run.reports.month(month.as_str()) {
        Some(report) => Ok(HttpResponse::Ok().json(report)),
        None => Ok(HttpResponse::BadRequest().json(serde_json::json!({"error": "Not a planned month"}))),
    }
}

async fn get_stats(state: web::Data<AppState>) -> Result<HttpResponse> {
    let latest = state.latest.lock().map_err(|_| lock_failed())?;
    let Some(run) = latest.as_ref() else {
        return Ok(no_run());
    };

    let mut months = BTreeMap::new();
    for &month in &state.config.planned_months {
        let Some(capacity) = run.result.context.ledger.remaining(month) else {
            continue;
        };
        let assigned = run.reports.month(month.name()).map(|r| r.rows.len()).unwrap_or(0);
        months.insert(
            month.name().to_string(),
            MonthStats {
                label: state.config.month_label(month),
                assigned,
                capacity: capacity.clone(),
            },
        );
    }

    Ok(HttpResponse::Ok().json(StatsResponse {
        evaluated: run.result.evaluations.len(),
        assigned: run.result.assigned_count(),
        declined: run.result.declined_count(),
        months,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/login", web::post().to(admin_login))
        .route("/api/upload", web::post().to(upload_performers))
        .route("/api/exceptions", web::post().to(upload_exceptions))
        .route("/api/stats", web::get().to(get_stats))
        .route("/api/report/assigned", web::get().to(get_assigned))
        .route("/api/report/declined", web::get().to(get_declined))
        .service(web::resource("/api/report/month/{month}").route(web::get().to(get_month)));
}

pub async fn start_server(port: u16, state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
