use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_str, opt_date, require_date, require_db, require_f64, require_str};
use crate::ipc::types::{AppState, Request};
use crate::pricing::Trade;
use rusqlite::{params, OptionalExtension};
use serde_json::{json, Value};

const PROJECT_STATUSES: [&str; 4] = ["active", "on_hold", "completed", "cancelled"];
const TRANSACTION_KINDS: [&str; 2] = ["income", "expense"];

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn handle_categories_list(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let mut out: Vec<Value> = Trade::ALL
        .iter()
        .map(|t| {
            json!({
                "id": t.category_id(),
                "name": t.label(),
                "trade": t,
                "builtIn": true,
            })
        })
        .collect();

    let mut stmt = match conn.prepare("SELECT id, name, trade FROM categories ORDER BY name") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "trade": row.get::<_, Option<String>>(2)?,
                "builtIn": false,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(custom) => out.extend(custom),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    ok(&req.id, json!({ "categories": out }))
}

fn handle_categories_create(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let name = try_param!(require_str(req, "name"));
    let trade = match get_str(req, "trade") {
        None => None,
        Some(raw) => match Trade::parse(raw) {
            Some(t) => Some(t),
            None => return err(&req.id, "bad_params", "unknown trade", None),
        },
    };
    let id = new_id();
    if let Err(e) = conn.execute(
        "INSERT INTO categories(id, name, trade, created_at) VALUES(?, ?, ?, ?)",
        params![id, name, trade.map(Trade::as_str), db::now_rfc3339()],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({ "category": { "id": id, "name": name, "trade": trade, "builtIn": false } }),
    )
}

fn quote_exists(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM quotes WHERE id = ?", [id], |_| Ok(()))
        .optional()
        .map(|r| r.is_some())
}

fn handle_projects_create(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let name = try_param!(require_str(req, "name"));
    let client_name = get_str(req, "clientName").unwrap_or("").trim();
    let status = get_str(req, "status").unwrap_or("active");
    if !PROJECT_STATUSES.contains(&status) {
        return err(
            &req.id,
            "bad_params",
            format!("status must be one of: {}", PROJECT_STATUSES.join(", ")),
            None,
        );
    }
    let start_date = try_param!(opt_date(req, "startDate"));
    let end_date = try_param!(opt_date(req, "endDate"));
    if let (Some(s), Some(e)) = (start_date, end_date) {
        if e < s {
            return err(&req.id, "bad_params", "endDate must not be before startDate", None);
        }
    }
    let quote_id = get_str(req, "quoteId");
    if let Some(qid) = quote_id {
        match quote_exists(conn, qid) {
            Ok(true) => {}
            Ok(false) => {
                return err(
                    &req.id,
                    "not_found",
                    "quote not found",
                    Some(json!({ "quoteId": qid })),
                )
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    let id = new_id();
    let created_at = db::now_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO projects(id, name, client_name, quote_id, status, start_date, end_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            name,
            client_name,
            quote_id,
            status,
            start_date.map(|d| d.to_string()),
            end_date.map(|d| d.to_string()),
            created_at,
        ],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    tracing::info!(project_id = %id, "project created");
    ok(
        &req.id,
        json!({
            "project": {
                "id": id,
                "name": name,
                "clientName": client_name,
                "quoteId": quote_id,
                "status": status,
                "startDate": start_date,
                "endDate": end_date,
                "createdAt": created_at,
            }
        }),
    )
}

fn handle_projects_list(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let status = get_str(req, "status");
    let client_name = get_str(req, "clientName");
    let quote_id = get_str(req, "quoteId");

    let mut stmt = match conn.prepare(
        "SELECT id, name, client_name, quote_id, status, start_date, end_date, created_at
         FROM projects
         WHERE (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR client_name = ?2)
           AND (?3 IS NULL OR quote_id = ?3)
         ORDER BY created_at DESC, rowid DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params![status, client_name, quote_id], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "clientName": row.get::<_, String>(2)?,
                "quoteId": row.get::<_, Option<String>>(3)?,
                "status": row.get::<_, String>(4)?,
                "startDate": row.get::<_, Option<String>>(5)?,
                "endDate": row.get::<_, Option<String>>(6)?,
                "createdAt": row.get::<_, String>(7)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(projects) => ok(&req.id, json!({ "projects": projects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_transactions_create(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let kind = try_param!(require_str(req, "kind"));
    if !TRANSACTION_KINDS.contains(&kind) {
        return err(&req.id, "bad_params", "kind must be one of: income, expense", None);
    }
    let amount = try_param!(require_f64(req, "amount"));
    if amount <= 0.0 {
        return err(&req.id, "bad_params", "amount must be greater than 0", None);
    }
    let date = try_param!(require_date(req, "date"));
    let description = get_str(req, "description").unwrap_or("").trim();
    let project_id = get_str(req, "projectId");
    let category_id = get_str(req, "categoryId");

    let id = new_id();
    if let Err(e) = conn.execute(
        "INSERT INTO financial_transactions(id, project_id, kind, amount, date, description, category_id, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            project_id,
            kind,
            amount,
            date.to_string(),
            description,
            category_id,
            db::now_rfc3339(),
        ],
    ) {
        // Unknown project ids fail the foreign key.
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({
            "transaction": {
                "id": id,
                "projectId": project_id,
                "kind": kind,
                "amount": amount,
                "date": date,
                "description": description,
                "categoryId": category_id,
            }
        }),
    )
}

fn handle_transactions_list(state: &mut AppState, req: &Request) -> Value {
    let conn = try_param!(require_db(state, req));
    let project_id = get_str(req, "projectId");
    let kind = get_str(req, "kind");
    let category_id = get_str(req, "categoryId");

    let mut stmt = match conn.prepare(
        "SELECT id, project_id, kind, amount, date, description, category_id
         FROM financial_transactions
         WHERE (?1 IS NULL OR project_id = ?1)
           AND (?2 IS NULL OR kind = ?2)
           AND (?3 IS NULL OR category_id = ?3)
         ORDER BY date DESC, created_at DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params![project_id, kind, category_id], |row| {
            Ok((
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                json!({
                    "id": row.get::<_, String>(0)?,
                    "projectId": row.get::<_, Option<String>>(1)?,
                    "kind": row.get::<_, String>(2)?,
                    "amount": row.get::<_, f64>(3)?,
                    "date": row.get::<_, String>(4)?,
                    "description": row.get::<_, String>(5)?,
                    "categoryId": row.get::<_, Option<String>>(6)?,
                }),
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let rows = match rows {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let (mut income, mut expenses) = (0.0_f64, 0.0_f64);
    for (k, amount, _) in &rows {
        if k == "income" {
            income += amount;
        } else {
            expenses += amount;
        }
    }
    let transactions: Vec<Value> = rows.into_iter().map(|(_, _, v)| v).collect();
    ok(
        &req.id,
        json!({
            "transactions": transactions,
            "totalIncome": income,
            "totalExpenses": expenses,
            "net": income - expenses,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "categories.list" => Some(handle_categories_list(state, req)),
        "categories.create" => Some(handle_categories_create(state, req)),
        "projects.create" => Some(handle_projects_create(state, req)),
        "projects.list" => Some(handle_projects_list(state, req)),
        "transactions.create" => Some(handle_transactions_create(state, req)),
        "transactions.list" => Some(handle_transactions_list(state, req)),
        _ => None,
    }
}
