use chrono::NaiveDate;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::pricing::Trade;
use crate::quote::{is_supported_date, MAX_SUPPORTED_YEAR, MIN_SUPPORTED_YEAR};

pub fn require_db<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn get_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn require_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    match get_str(req, key).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("missing params.{}", key),
            None,
        )),
    }
}

pub fn require_trade(req: &Request) -> Result<Trade, Value> {
    let raw = require_str(req, "trade")?;
    Trade::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("unknown trade: {}", raw),
            Some(serde_json::json!({ "allowed": Trade::ALL.map(Trade::as_str) })),
        )
    })
}

/// `YYYY-MM-DD` within the supported years only; absent or null gives `None`.
pub fn opt_date(req: &Request, key: &str) -> Result<Option<NaiveDate>, Value> {
    let parsed = match req.params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        Some(_) => None,
    };
    match parsed {
        Some(d) if is_supported_date(d) => Ok(Some(d)),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!(
                "params.{} must be a YYYY-MM-DD date between {} and {}",
                key, MIN_SUPPORTED_YEAR, MAX_SUPPORTED_YEAR
            ),
            None,
        )),
    }
}

pub fn require_date(req: &Request, key: &str) -> Result<NaiveDate, Value> {
    opt_date(req, key)?.ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("missing params.{}", key),
            None,
        )
    })
}

pub fn opt_f64(req: &Request, key: &str) -> Result<Option<f64>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("params.{} must be a number", key),
                None,
            )),
        },
    }
}

pub fn require_f64(req: &Request, key: &str) -> Result<f64, Value> {
    opt_f64(req, key)?.ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("missing params.{}", key),
            None,
        )
    })
}

pub fn layers_param(req: &Request) -> Result<u32, Value> {
    match req.params.get("layers") {
        None | Some(Value::Null) => Ok(1),
        Some(v) => match v.as_u64() {
            Some(n) if (1..=20).contains(&n) => Ok(n as u32),
            _ => Err(err(
                &req.id,
                "bad_params",
                "params.layers must be an integer in 1..=20",
                None,
            )),
        },
    }
}

/// Deserializes `params[key]` into `T`; serde's message becomes the error.
pub fn parse_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(
            &req.id,
            "bad_params",
            format!("missing params.{}", key),
            None,
        ));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid params.{}: {}", key, e),
            None,
        )
    })
}
