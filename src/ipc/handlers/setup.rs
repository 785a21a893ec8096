use crate::cashflow::{CashFlowSettings, ExpenseTiming, ExpenseTimingConfig, TimingRule};
use crate::catalog;
use crate::db;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{parse_param, require_db};
use crate::ipc::types::{AppState, Request};
use crate::pricing::{PanelDefaults, Trade};
use crate::quote::{validate_payment_terms, PaymentTerm};
use serde_json::{json, Map, Value};

const PAYMENT_TERMS_KEY: &str = "paymentTerms.default";

fn section_key(trade: Trade) -> String {
    format!("defaults.{}", trade.as_str())
}

fn default_section(trade: Trade) -> Value {
    let timing = serde_json::to_value(ExpenseTiming::default_for(trade).to_config())
        .unwrap_or(Value::Null);
    let profit = catalog::default_profit_percent(trade);
    match trade {
        Trade::Paint => json!({
            "desiredProfitPercent": profit,
            "laborCostPerDay": 400,
            "roundBuckets": true,
            "roundWorkDays": false,
            "expenseTiming": timing
        }),
        Trade::Tiling => json!({
            "desiredProfitPercent": profit,
            "laborCostPerDay": 800,
            "panelLaborWorkCapacity": 50,
            "panelUtilizationPercent": 30,
            "expenseTiming": timing
        }),
        Trade::Demolition => json!({
            "desiredProfitPercent": profit,
            "laborCostPerDay": 450,
            "expenseTiming": timing
        }),
        Trade::Electrical | Trade::Plumbing | Trade::Construction => json!({
            "desiredProfitPercent": profit,
            "expenseTiming": timing
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal defaults object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_f64_range(v: &Value, key: &str, min: f64, max: f64) -> Result<f64, String> {
    let n = v
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("{} must be a number", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_positive_max(v: &Value, key: &str, max: f64) -> Result<f64, String> {
    let n = parse_f64_range(v, key, 0.0, max)?;
    if n <= 0.0 {
        return Err(format!("{} must be greater than 0", key));
    }
    Ok(n)
}

fn check_rule(rule: Option<TimingRule>, key: &str) -> Result<(), String> {
    match rule {
        Some(TimingRule::FixedDayOfMonth { day_of_month }) if !(1..=31).contains(&day_of_month) => {
            Err(format!("{}.dayOfMonth must be in 1..=31", key))
        }
        Some(TimingRule::OffsetFromCategoryStart { offset_days })
        | Some(TimingRule::OffsetFromCategoryEnd { offset_days })
            if offset_days.abs() > 365 =>
        {
            Err(format!("{}.offsetDays must be in -365..=365", key))
        }
        _ => Ok(()),
    }
}

fn parse_expense_timing(trade: Trade, v: &Value) -> Result<Value, String> {
    let config: ExpenseTimingConfig = serde_json::from_value(v.clone())
        .map_err(|e| format!("expenseTiming is invalid: {}", e))?;
    if trade.is_subcontracted() {
        if config.labor.is_some() || config.materials.is_some() {
            return Err(format!(
                "{} is paid as a subcontract; use expenseTiming.payment",
                trade.as_str()
            ));
        }
    } else if config.payment.is_some() {
        return Err(format!(
            "{} expenses use expenseTiming.labor and expenseTiming.materials",
            trade.as_str()
        ));
    }
    check_rule(config.labor, "expenseTiming.labor")?;
    check_rule(config.materials, "expenseTiming.materials")?;
    serde_json::to_value(config).map_err(|e| e.to_string())
}

fn merge_section_patch(
    trade: Trade,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match (trade, k.as_str()) {
            (_, "desiredProfitPercent") => {
                obj.insert(k.clone(), Value::from(parse_f64_range(v, k, 0.0, 500.0)?));
            }
            (_, "expenseTiming") => {
                obj.insert(k.clone(), parse_expense_timing(trade, v)?);
            }
            (Trade::Paint | Trade::Tiling | Trade::Demolition, "laborCostPerDay") => {
                obj.insert(k.clone(), Value::from(parse_f64_range(v, k, 0.0, 100_000.0)?));
            }
            (Trade::Paint, "roundBuckets" | "roundWorkDays") => {
                obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
            }
            (Trade::Tiling, "panelLaborWorkCapacity") => {
                obj.insert(k.clone(), Value::from(parse_positive_max(v, k, 10_000.0)?));
            }
            (Trade::Tiling, "panelUtilizationPercent") => {
                obj.insert(k.clone(), Value::from(parse_positive_max(v, k, 100.0)?));
            }
            _ => return Err(format!("unknown {} field: {}", trade.as_str(), k)),
        }
    }
    Ok(())
}

pub fn load_section(conn: &rusqlite::Connection, trade: Trade) -> anyhow::Result<Value> {
    let mut current = default_section(trade);
    if let Some(saved) = db::settings_get_json(conn, &section_key(trade))? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: a malformed saved field must not hide the rest.
            if let Err(e) = merge_section_patch(trade, &mut current, saved_obj) {
                tracing::warn!(trade = trade.as_str(), error = %e, "ignoring invalid saved defaults");
            }
        }
    }
    Ok(current)
}

pub fn trade_profit_percent(conn: &rusqlite::Connection, trade: Trade) -> anyhow::Result<f64> {
    let section = load_section(conn, trade)?;
    Ok(section
        .get("desiredProfitPercent")
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| catalog::default_profit_percent(trade)))
}

pub fn panel_defaults(conn: &rusqlite::Connection) -> anyhow::Result<PanelDefaults> {
    let section = load_section(conn, Trade::Tiling)?;
    Ok(serde_json::from_value(section)?)
}

/// `(roundBuckets, roundWorkDays)` for paint calculations.
pub fn paint_rounding(conn: &rusqlite::Connection) -> anyhow::Result<(bool, bool)> {
    let section = load_section(conn, Trade::Paint)?;
    Ok((
        section
            .get("roundBuckets")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
        section
            .get("roundWorkDays")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    ))
}

pub fn default_payment_terms(conn: &rusqlite::Connection) -> anyhow::Result<Vec<PaymentTerm>> {
    match db::settings_get_json(conn, PAYMENT_TERMS_KEY)? {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(Vec::new()),
    }
}

pub fn cashflow_settings(conn: &rusqlite::Connection) -> anyhow::Result<CashFlowSettings> {
    let mut settings = CashFlowSettings {
        default_payment_terms: default_payment_terms(conn)?,
        ..Default::default()
    };
    for trade in Trade::ALL {
        let section = load_section(conn, trade)?;
        if let Some(timing) = section.get("expenseTiming") {
            let config: ExpenseTimingConfig = serde_json::from_value(timing.clone())?;
            settings.expense_timing.insert(trade, config);
        }
    }
    Ok(settings)
}

fn handle_defaults_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let mut out = Map::new();
    for trade in Trade::ALL {
        match load_section(conn, trade) {
            Ok(v) => {
                out.insert(trade.as_str().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_defaults_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(trade_raw) = req.params.get("trade").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing trade", None);
    };
    let Some(trade) = Trade::parse(trade_raw) else {
        return err(&req.id, "bad_params", "unknown trade", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, trade) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(trade, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, &section_key(trade), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(trade = trade.as_str(), fields = patch_obj.len(), "trade defaults updated");
    ok(&req.id, json!({ "ok": true, "defaults": current }))
}

fn handle_payment_terms_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match default_payment_terms(conn) {
        Ok(terms) => ok(&req.id, json!({ "terms": terms })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_payment_terms_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let terms: Vec<PaymentTerm> = match parse_param(req, "terms") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = validate_payment_terms(&terms) {
        return calc_err(&req.id, e);
    }
    let value = match serde_json::to_value(&terms) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if let Err(e) = db::settings_set_json(conn, PAYMENT_TERMS_KEY, &value) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "terms": terms }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "defaults.get" => Some(handle_defaults_get(state, req)),
        "defaults.update" => Some(handle_defaults_update(state, req)),
        "paymentTerms.getDefault" => Some(handle_payment_terms_get(state, req)),
        "paymentTerms.setDefault" => Some(handle_payment_terms_set(state, req)),
        _ => None,
    }
}
