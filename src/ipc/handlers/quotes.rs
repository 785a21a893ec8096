use crate::db;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::handlers::{catalog, setup};
use crate::ipc::helpers::{
    get_str, layers_param, opt_date, parse_param, require_date, require_db, require_f64,
    require_str, require_trade,
};
use crate::ipc::types::{AppState, Request};
use crate::pricing::{check_profit_margin, CatalogItem, DEFAULT_MINIMUM_PROFIT_PERCENT};
use crate::quote::{
    self, is_approval_dependent, price_quote_item, quote_totals, PaymentTerm, Quote, QuoteStatus,
};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

const PATCHABLE_FIELDS: [&str; 10] = [
    "projectName",
    "clientName",
    "items",
    "paymentTerms",
    "categoryTimings",
    "discountPercent",
    "priceIncreasePercent",
    "additionalCosts",
    "createdAt",
    "startDate",
];

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validates, fills item ids and re-derives totals before a quote is stored.
fn finalize_quote(req: &Request, mut quote: Quote) -> Result<Quote, Value> {
    if quote.project_name.trim().is_empty() {
        return Err(err(&req.id, "bad_params", "projectName must not be empty", None));
    }
    quote.validate().map_err(|e| calc_err(&req.id, e))?;
    for item in quote.items.iter_mut() {
        if item.id.trim().is_empty() {
            item.id = new_id();
        }
    }
    quote.refresh_totals();
    Ok(quote)
}

fn load_quote(conn: &Connection, req: &Request) -> Result<Quote, Value> {
    let id = require_str(req, "id")?;
    match db::quote_get(conn, id) {
        Ok(Some(q)) => Ok(q),
        Ok(None) => Err(err(
            &req.id,
            "not_found",
            "quote not found",
            Some(json!({ "id": id })),
        )),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn save_quote(conn: &Connection, req: &Request, quote: &Quote, code: &str) -> Option<Value> {
    match db::quote_upsert(conn, quote) {
        Ok(()) => None,
        Err(e) => {
            tracing::error!(quote_id = %quote.id, error = ?e, "failed to save quote");
            Some(err(&req.id, code, e.to_string(), None))
        }
    }
}

fn handle_price_item(state: &mut AppState, req: &Request) -> Value {
    let trade = try_param!(require_trade(req));
    let quantity = try_param!(require_f64(req, "quantity"));
    let layers = try_param!(layers_param(req));

    let (item, default_profit) = match state.db.as_ref() {
        Some(conn) => {
            let profit = match setup::trade_profit_percent(conn, trade) {
                Ok(p) => Some(p),
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            let item = if req.params.get("item").is_some() {
                try_param!(parse_param::<CatalogItem>(req, "item"))
            } else {
                let item_id = try_param!(require_str(req, "itemId"));
                match catalog::find_item(conn, trade, item_id) {
                    Ok(Some(i)) => i,
                    Ok(None) => {
                        return err(
                            &req.id,
                            "not_found",
                            "catalog item not found",
                            Some(json!({ "trade": trade, "itemId": item_id })),
                        )
                    }
                    Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
                }
            };
            (item, profit)
        }
        None => {
            if req.params.get("item").is_none() {
                return err(&req.id, "no_workspace", "select a workspace first", None);
            }
            (try_param!(parse_param::<CatalogItem>(req, "item")), None)
        }
    };
    if let Err(e) = item.validate() {
        return calc_err(&req.id, e);
    }

    match price_quote_item(&item, trade, quantity, layers, default_profit) {
        Ok(mut line) => {
            line.id = new_id();
            ok(&req.id, json!({ "item": line }))
        }
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_quotes_create(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let Some(obj) = req.params.get("quote").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "quote must be an object", None);
    };
    let mut raw = obj.clone();
    raw.insert("id".into(), Value::String(new_id()));
    raw.remove("status");
    raw.entry("createdAt")
        .or_insert_with(|| Value::String(today().to_string()));

    let quote: Quote = match serde_json::from_value(Value::Object(raw)) {
        Ok(q) => q,
        Err(e) => return err(&req.id, "bad_params", format!("invalid quote: {}", e), None),
    };
    let quote = try_param!(finalize_quote(req, quote));
    if let Some(resp) = save_quote(conn, req, &quote, "db_insert_failed") {
        return resp;
    }
    tracing::info!(quote_id = %quote.id, items = quote.items.len(), "quote created");
    ok(&req.id, json!({ "quote": quote }))
}

fn handle_quotes_get(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let quote = try_param!(load_quote(conn, req));
    ok(&req.id, json!({ "quote": quote }))
}

fn handle_quotes_list(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let status = match get_str(req, "status") {
        None => None,
        Some(s) => match QuoteStatus::parse(s) {
            Some(st) => Some(st),
            None => return err(&req.id, "bad_params", "unknown status", None),
        },
    };
    match db::quote_list(conn, status) {
        Ok(quotes) => {
            let rows: Vec<Value> = quotes
                .iter()
                .map(|q| {
                    json!({
                        "id": q.id,
                        "projectName": q.project_name,
                        "clientName": q.client_name,
                        "status": q.status,
                        "createdAt": q.created_at,
                        "totalPrice": q.total_price,
                        "totalCost": q.total_cost,
                        "itemCount": q.items.len(),
                    })
                })
                .collect();
            ok(&req.id, json!({ "quotes": rows }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn apply_patch(current: &Quote, patch: &Map<String, Value>) -> Result<Quote, String> {
    let mut raw = serde_json::to_value(current).map_err(|e| e.to_string())?;
    let obj = raw
        .as_object_mut()
        .ok_or_else(|| "internal quote object must be a JSON object".to_string())?;
    for (k, v) in patch {
        if !PATCHABLE_FIELDS.contains(&k.as_str()) {
            return Err(format!("field cannot be updated: {}", k));
        }
        obj.insert(k.clone(), v.clone());
    }
    serde_json::from_value(raw).map_err(|e| format!("invalid quote: {}", e))
}

fn handle_quotes_update(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let current = try_param!(load_quote(conn, req));
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    let updated = match apply_patch(&current, patch) {
        Ok(q) => q,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let updated = try_param!(finalize_quote(req, updated));
    if let Some(resp) = save_quote(conn, req, &updated, "db_update_failed") {
        return resp;
    }
    ok(&req.id, json!({ "quote": updated }))
}

fn handle_quotes_set_status(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let mut quote = try_param!(load_quote(conn, req));
    let Some(status) = get_str(req, "status").and_then(QuoteStatus::parse) else {
        return err(
            &req.id,
            "bad_params",
            "status must be one of: draft, sent, approved, rejected",
            None,
        );
    };
    let previous = quote.status;
    quote.status = status;
    if let Some(resp) = save_quote(conn, req, &quote, "db_update_failed") {
        return resp;
    }
    tracing::info!(
        quote_id = %quote.id,
        from = previous.as_str(),
        to = status.as_str(),
        "quote status changed"
    );
    ok(&req.id, json!({ "quote": quote }))
}

fn handle_quotes_delete(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let id = try_param!(require_str(req, "id"));
    match db::quote_delete(conn, id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true })),
        Ok(false) => err(&req.id, "not_found", "quote not found", Some(json!({ "id": id }))),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_quotes_totals(state: &mut AppState, req: &Request) -> Value {
    let quote = if req.params.get("quote").is_some() {
        let q: Quote = try_param!(parse_param(req, "quote"));
        if let Err(e) = q.validate() {
            return calc_err(&req.id, e);
        }
        q
    } else {
        let conn = try_param!(require_db(state, req));
        try_param!(load_quote(conn, req))
    };
    let totals = quote_totals(&quote);
    let guard = check_profit_margin(
        totals.total,
        totals.total_contractor_cost,
        DEFAULT_MINIMUM_PROFIT_PERCENT,
    );
    ok(&req.id, json!({ "totals": totals, "profitGuard": guard }))
}

fn handle_recalculate_payment_dates(state: &mut AppState, req: &Request) -> Value {
    let start = try_param!(require_date(req, "projectStartDate"));
    let end = try_param!(require_date(req, "projectEndDate"));
    if end < start {
        return err(
            &req.id,
            "bad_params",
            "projectEndDate must not be before projectStartDate",
            None,
        );
    }
    let approval = try_param!(opt_date(req, "approvalDate"));

    if req.params.get("terms").is_some() {
        let terms: Vec<PaymentTerm> = try_param!(parse_param(req, "terms"));
        let out = quote::recalculate_payment_dates(&terms, start, end, approval);
        return ok(&req.id, json!({ "terms": out }));
    }

    let conn = try_param!(require_db(state, req));
    let mut q = try_param!(load_quote(conn, req));
    let approval = approval.or((q.status == QuoteStatus::Approved).then_some(q.created_at));
    let terms = quote::recalculate_payment_dates(&q.payment_terms, start, end, approval);
    let pending: Vec<&str> = terms
        .iter()
        .filter(|t| t.payment_date.is_none() && is_approval_dependent(&t.milestone))
        .map(|t| t.milestone.as_str())
        .collect();
    let result = json!({ "terms": terms, "awaitingApproval": pending });

    let save = req
        .params
        .get("save")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if save {
        q.payment_terms = terms.clone();
        if q.start_date.is_none() {
            q.start_date = Some(start);
        }
        if let Some(resp) = save_quote(conn, req, &q, "db_update_failed") {
            return resp;
        }
    }
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "quotes.priceItem" => Some(handle_price_item(state, req)),
        "quotes.create" => Some(handle_quotes_create(state, req)),
        "quotes.get" => Some(handle_quotes_get(state, req)),
        "quotes.list" => Some(handle_quotes_list(state, req)),
        "quotes.update" => Some(handle_quotes_update(state, req)),
        "quotes.setStatus" => Some(handle_quotes_set_status(state, req)),
        "quotes.delete" => Some(handle_quotes_delete(state, req)),
        "quotes.totals" => Some(handle_quotes_totals(state, req)),
        "quotes.recalculatePaymentDates" => Some(handle_recalculate_payment_dates(state, req)),
        _ => None,
    }
}
