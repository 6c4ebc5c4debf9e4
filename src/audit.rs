// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Audit log sinks.
//!
//! Every committed mutation records an [`AuditEvent`]. Recording is
//! fire-and-forget from the engine's point of view: a failing sink is logged
//! and ignored, it never fails the business operation that produced the
//! event.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::base::Actor;

/// Failure inside an audit sink.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit log i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit log encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(rename = "usuario")]
    pub actor: Actor,
    #[serde(rename = "accion")]
    pub action: String,
    #[serde(rename = "detalles")]
    pub details: Value,
    #[serde(rename = "fecha")]
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(actor: &Actor, action: impl Into<String>, details: Value) -> Self {
        Self {
            actor: actor.clone(),
            action: action.into(),
            details,
            recorded_at: Utc::now(),
        }
    }
}

/// Destination of audit events.
pub trait AuditLog: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;

    /// All recorded events, oldest first. File-backed sinks skip lines they
    /// cannot decode.
    fn entries(&self) -> Result<Vec<AuditEvent>, AuditError>;
}

/// Keeps events in memory. Handy for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self.events.lock().clone())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesAuditLog {
    path: PathBuf,
    // serializes appends from this process
    write_lock: Mutex<()>,
}

impl JsonLinesAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for JsonLinesAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<AuditEvent>, AuditError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(event) => events.push(event),
                Err(err) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %err,
                    "skipping malformed audit line"
                ),
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "pos-ledger-audit-{}-{name}.jsonl",
            std::process::id()
        ))
    }

    #[test]
    fn memory_log_keeps_order() {
        let log = MemoryAuditLog::new();
        let actor = Actor::from("ana");
        log.record(&AuditEvent::new(&actor, "a", json!({}))).unwrap();
        log.record(&AuditEvent::new(&actor, "b", json!({"x": 1}))).unwrap();

        let actions: Vec<String> = log.entries().unwrap().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["a", "b"]);
    }

    #[test]
    fn json_lines_log_appends_and_reads_back() {
        let path = temp_path("append");
        let _ = std::fs::remove_file(&path);
        let log = JsonLinesAuditLog::new(&path);
        assert!(log.entries().unwrap().is_empty());

        let actor = Actor::system();
        log.record(&AuditEvent::new(&actor, "crear_deuda", json!({"deuda_id": 1})))
            .unwrap();
        log.record(&AuditEvent::new(&actor, "eliminar_deuda", json!({"deuda_id": 1})))
            .unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].details["deuda_id"], 1);
        assert_eq!(entries[1].action, "eliminar_deuda");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.lines().all(|l| l.contains("\"usuario\":\"sistema\"")));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let path = temp_path("malformed");
        let _ = std::fs::remove_file(&path);
        let log = JsonLinesAuditLog::new(&path);
        let actor = Actor::system();
        log.record(&AuditEvent::new(&actor, "agregar_cliente", json!({"cliente_id": 1})))
            .unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"usuario\": \"caja1\", trunc\n").unwrap();
            file.write_all(b"not json at all\n").unwrap();
        }
        log.record(&AuditEvent::new(&actor, "eliminar_cliente", json!({"cliente_id": 1})))
            .unwrap();

        let actions: Vec<String> = log.entries().unwrap().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["agregar_cliente", "eliminar_cliente"]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = std::env::temp_dir().join(format!("pos-ledger-missing-{}", std::process::id()));
        let log = JsonLinesAuditLog::new(dir.join("nested").join("audit.jsonl"));
        let result = log.record(&AuditEvent::new(&Actor::system(), "x", Value::Null));
        assert!(matches!(result, Err(AuditError::Io(_))));
    }
}
