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

//! Settings for the command line front end.
//!
//! Read from an optional `pos-ledger.toml` (or the file given with
//! `--config`), then from `POS_LEDGER__*` environment variables, e.g.
//! `POS_LEDGER__DATA_PATH=/srv/shop.json`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_FILE: &str = "pos-ledger";
const ENV_PREFIX: &str = "POS_LEDGER";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// JSON snapshot holding the ledger tables.
    pub data_path: PathBuf,
    /// JSON-lines audit log.
    pub audit_path: PathBuf,
    /// Default `tracing` level for this crate.
    pub log_level: String,
    /// User recorded in the audit log when none is given.
    pub actor: String,
}

impl Settings {
    /// Loads settings from `file` (or `pos-ledger.toml` when `None`, if it
    /// exists) and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        Config::builder()
            .set_default("data_path", "pos-ledger.json")?
            .set_default("audit_path", "pos-ledger-audit.jsonl")?
            .set_default("log_level", "info")?
            .set_default("actor", "sistema")?
            .add_source(source)
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }
}
