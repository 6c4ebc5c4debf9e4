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
//! Shop user accounts.
//!
//! Passwords are stored as Argon2 PHC strings. Logging in and session
//! handling live outside the ledger; it only keeps the accounts and checks a
//! password against its hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::base::UserId;
use crate::error::LedgerError;

/// Shortest password accepted for an account.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "empleado")]
    Employee,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admin => "admin",
            Self::Employee => "empleado",
        })
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "empleado" | "employee" => Ok(Self::Employee),
            other => Err(LedgerError::validation(format!("unknown role '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Checks `password` against the stored hash.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Credential`] if the stored hash cannot be parsed.
    pub fn password_matches(&self, password: &str) -> Result<bool, LedgerError> {
        verify_password(password, &self.password_hash)
    }
}

pub(crate) fn validated_username(username: &str) -> Result<String, LedgerError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(LedgerError::validation("username cannot be empty"));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(LedgerError::validation("username cannot contain spaces"));
    }
    Ok(username.to_string())
}

/// Hashes a password with a fresh random salt.
pub(crate) fn hash_password(password: &str) -> Result<String, LedgerError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LedgerError::validation(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| LedgerError::Credential(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool, LedgerError> {
    let parsed = PasswordHash::new(hash).map_err(|e| LedgerError::Credential(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(LedgerError::Credential(e.to_string())),
    }
}
