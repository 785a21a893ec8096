use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = PathBuf::from(try_param!(require_str(req, "outPath")));

    match backup::export_workspace_bundle(&workspace, &out_path) {
        Ok(summary) => {
            tracing::info!(out = %out_path.display(), sha256 = %summary.db_sha256, "workspace exported");
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "path": out_path.to_string_lossy(),
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "dbSha256": summary.db_sha256,
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = ?e, "workspace export failed");
            err(&req.id, "bundle_failed", format!("{e:?}"), None)
        }
    }
}

fn handle_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = PathBuf::from(try_param!(require_str(req, "inPath")));

    // The open connection holds the file; release it before swapping.
    state.db = None;
    let imported = backup::import_workspace_bundle(&in_path, &workspace);

    match db::open_db(&workspace) {
        Ok(conn) => state.db = Some(conn),
        Err(e) => {
            tracing::error!(error = ?e, "failed to reopen workspace after import");
            return err(&req.id, "db_open_failed", format!("{e:?}"), None);
        }
    }

    match imported {
        Ok(summary) => {
            tracing::info!(
                input = %in_path.display(),
                format = %summary.bundle_format_detected,
                "workspace imported"
            );
            ok(
                &req.id,
                json!({
                    "ok": true,
                    "bundleFormatDetected": summary.bundle_format_detected,
                    "dbSha256": summary.db_sha256,
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = ?e, "workspace import failed");
            err(&req.id, "bundle_failed", format!("{e:?}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_import_workspace_bundle(state, req)),
        _ => None,
    }
}
