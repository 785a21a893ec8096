use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

use crate::keys;
use crate::quote::{Quote, QuoteStatus};

pub const DB_FILE_NAME: &str = "pricebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Opaque JSON blobs (trade defaults, catalogs, payment terms), snake_case keys.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS profile(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            trade TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS quotes(
            id TEXT PRIMARY KEY,
            project_name TEXT NOT NULL,
            client_name TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            total_price REAL NOT NULL DEFAULT 0,
            total_cost REAL NOT NULL DEFAULT 0,
            quote_json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quotes_status ON quotes(status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            client_name TEXT NOT NULL DEFAULT '',
            quote_id TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            start_date TEXT,
            end_date TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(quote_id) REFERENCES quotes(id) ON DELETE SET NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS financial_transactions(
            id TEXT PRIMARY KEY,
            project_id TEXT,
            kind TEXT NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_project ON financial_transactions(project_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON financial_transactions(date)",
        [],
    )?;

    Ok(conn)
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Reads a profile blob with its keys converted to camelCase.
pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM profile WHERE key = ?",
            [key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read profile key {}", key))?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("profile key {} holds malformed JSON", key))?;
    Ok(Some(keys::keys_to_camel(value)))
}

/// Stores a profile blob, converting its keys to snake_case. Last write wins.
pub fn settings_set_json(conn: &Connection, key: &str, value: &Value) -> anyhow::Result<()> {
    let stored = keys::keys_to_snake(value.clone());
    conn.execute(
        "INSERT INTO profile(key, value_json, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
        params![key, serde_json::to_string(&stored)?, now_rfc3339()],
    )
    .with_context(|| format!("failed to write profile key {}", key))?;
    Ok(())
}

pub fn quote_upsert(conn: &Connection, quote: &Quote) -> anyhow::Result<()> {
    let json = serde_json::to_string(quote)?;
    conn.execute(
        "INSERT INTO quotes(id, project_name, client_name, status, created_at, total_price, total_cost, quote_json, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            project_name = excluded.project_name,
            client_name = excluded.client_name,
            status = excluded.status,
            created_at = excluded.created_at,
            total_price = excluded.total_price,
            total_cost = excluded.total_cost,
            quote_json = excluded.quote_json,
            updated_at = excluded.updated_at",
        params![
            quote.id,
            quote.project_name,
            quote.client_name,
            quote.status.as_str(),
            quote.created_at.to_string(),
            quote.total_price,
            quote.total_cost,
            json,
            now_rfc3339(),
        ],
    )
    .with_context(|| format!("failed to save quote {}", quote.id))?;
    Ok(())
}

fn quote_from_json(id: &str, raw: &str) -> anyhow::Result<Quote> {
    serde_json::from_str(raw).with_context(|| format!("quote {} holds malformed JSON", id))
}

pub fn quote_get(conn: &Connection, id: &str) -> anyhow::Result<Option<Quote>> {
    let raw: Option<String> = conn
        .query_row("SELECT quote_json FROM quotes WHERE id = ?", [id], |row| {
            row.get(0)
        })
        .optional()?;
    raw.map(|r| quote_from_json(id, &r)).transpose()
}

/// Quotes newest first, optionally filtered by status.
pub fn quote_list(conn: &Connection, status: Option<QuoteStatus>) -> anyhow::Result<Vec<Quote>> {
    let mut stmt = conn.prepare(
        "SELECT id, quote_json FROM quotes
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([status.map(QuoteStatus::as_str)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.iter()
        .map(|(id, raw)| quote_from_json(id, raw))
        .collect()
}

pub fn quote_delete(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM quotes WHERE id = ?", [id])?;
    Ok(n > 0)
}
