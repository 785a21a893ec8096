use crate::cashflow::{
    project_daily, project_monthly, CashFlowSettings, DailyProjection, MonthlyProjection,
    DAILY_RANGES, MONTHLY_RANGES,
};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{opt_date, require_db};
use crate::ipc::types::{AppState, Request};
use crate::quote::{Quote, QuoteStatus};
use rusqlite::Connection;
use serde_json::{json, Value};

fn range_param(req: &Request, key: &str, allowed: &[u32], default: u32) -> Result<u32, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => match v.as_u64() {
            Some(n) if allowed.iter().any(|a| u64::from(*a) == n) => Ok(n as u32),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("params.{} must be one of {:?}", key, allowed),
                None,
            )),
        },
    }
}

/// Approved quotes plus the settings needed to project them. A read failure
/// is logged and projects as an empty workspace.
fn load_inputs(conn: &Connection) -> (Vec<Quote>, CashFlowSettings) {
    let quotes = db::quote_list(conn, Some(QuoteStatus::Approved)).unwrap_or_else(|e| {
        tracing::error!(error = ?e, "failed to load approved quotes for cash flow");
        Vec::new()
    });
    let settings = setup::cashflow_settings(conn).unwrap_or_else(|e| {
        tracing::error!(error = ?e, "failed to load cash flow settings");
        CashFlowSettings::default()
    });
    (quotes, settings)
}

fn handle_daily(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let start = try_param!(opt_date(req, "start")).unwrap_or_else(|| chrono::Local::now().date_naive());
    let days = try_param!(range_param(req, "days", &DAILY_RANGES, 30));
    let (quotes, settings) = load_inputs(conn);
    let projection: DailyProjection = project_daily(&quotes, &settings, start, days);
    tracing::debug!(quotes = quotes.len(), days, "daily cash flow projected");
    ok(
        &req.id,
        json!({ "start": start, "days": days, "projection": projection }),
    )
}

fn handle_monthly(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let start = try_param!(opt_date(req, "start")).unwrap_or_else(|| chrono::Local::now().date_naive());
    let months = try_param!(range_param(req, "months", &MONTHLY_RANGES, 6));
    let (quotes, settings) = load_inputs(conn);
    let projection: MonthlyProjection = project_monthly(&quotes, &settings, start, months);
    tracing::debug!(quotes = quotes.len(), months, "monthly cash flow projected");
    ok(
        &req.id,
        json!({ "start": start, "months": months, "projection": projection }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "cashflow.daily" => Some(handle_daily(state, req)),
        "cashflow.monthly" => Some(handle_monthly(state, req)),
        _ => None,
    }
}
