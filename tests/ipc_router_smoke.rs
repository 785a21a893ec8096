use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_pricebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn pricebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_line(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_line(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("pricebook-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], true);
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request(&mut stdin, &mut reader, "3", "catalog.trades", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "catalog.list",
        json!({ "trade": "paint" }),
    );
    let _ = request(&mut stdin, &mut reader, "5", "defaults.get", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "paymentTerms.getDefault",
        json!({}),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "pricing.itemMetrics",
        json!({ "trade": "paint", "itemId": "default_pnt_1", "quantity": 30 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "pricing.clientPrice",
        json!({ "cost": 100, "profitPercent": 40 }),
    );
    let priced = request(
        &mut stdin,
        &mut reader,
        "9",
        "quotes.priceItem",
        json!({ "trade": "electrical", "itemId": "el_pt_1", "quantity": 4 }),
    );
    let line = priced["result"]["item"].clone();
    let created = request(
        &mut stdin,
        &mut reader,
        "10",
        "quotes.create",
        json!({ "quote": { "projectName": "Smoke", "clientName": "Router", "items": [line] } }),
    );
    let quote_id = created["result"]["quote"]["id"]
        .as_str()
        .expect("quote id")
        .to_string();
    let _ = request(&mut stdin, &mut reader, "11", "quotes.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "quotes.totals",
        json!({ "id": quote_id }),
    );
    let _ = request(&mut stdin, &mut reader, "13", "categories.list", json!({}));
    let _ = request(&mut stdin, &mut reader, "14", "projects.list", json!({}));
    let _ = request(&mut stdin, &mut reader, "15", "transactions.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "16",
        "cashflow.daily",
        json!({ "days": 7 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "17",
        "cashflow.monthly",
        json!({ "months": 3 }),
    );
    let exported = request(
        &mut stdin,
        &mut reader,
        "18",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(exported["ok"], true, "{}", exported);
    let imported = request(
        &mut stdin,
        &mut reader,
        "19",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(imported["ok"], true, "{}", imported);
    let after = request(
        &mut stdin,
        &mut reader,
        "20",
        "quotes.get",
        json!({ "id": quote_id }),
    );
    assert_eq!(after["result"]["quote"]["projectName"], "Smoke");
    let _ = request(
        &mut stdin,
        &mut reader,
        "21",
        "quotes.delete",
        json!({ "id": quote_id }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_methods_and_bad_lines_get_error_replies() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{\"id\":\"x1\",\"method\":\"nope.nothing\",\"params\":{{}}}}")
        .expect("write unknown");
    stdin.flush().expect("flush");
    let resp = read_line(&mut reader);
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "not_implemented");

    writeln!(stdin, "this is not json").expect("write junk");
    stdin.flush().expect("flush");
    let resp = read_line(&mut reader);
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_json");

    let resp = request(
        &mut stdin,
        &mut reader,
        "x2",
        "catalog.list",
        json!({ "trade": "paint" }),
    );
    assert_eq!(resp["error"]["code"], "no_workspace");

    drop(stdin);
    let _ = child.wait();
}
