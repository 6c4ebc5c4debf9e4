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
//! User accounts: creation, roles, activation and password changes.

use chrono::Utc;
use serde_json::json;

use crate::base::{Actor, UserId};
use crate::engine::Engine;
use crate::error::LedgerError;
use crate::store::LedgerState;
use crate::user::{Role, User, hash_password, validated_username};

/// Fails if the change would leave no active admin.
fn ensure_admin_remains(state: &LedgerState, user_id: UserId) -> Result<(), LedgerError> {
    let others = state
        .users
        .iter()
        .any(|u| u.id != user_id && u.active && u.role == Role::Admin);
    if !others {
        return Err(LedgerError::validation("the last active admin cannot be removed"));
    }
    Ok(())
}

impl Engine {
    /// Creates an active account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] - Blank or taken username, or a password
    ///   shorter than [`MIN_PASSWORD_LEN`](crate::user::MIN_PASSWORD_LEN).
    /// - [`LedgerError::Credential`] - The password could not be hashed.
    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
        actor: &Actor,
    ) -> Result<User, LedgerError> {
        let username = validated_username(username)?;
        // hashing is slow; keep it out of the store lock
        let password_hash = hash_password(password)?;
        let user = self.store.transaction(|state| {
            if state.users.iter().any(|u| u.username == username) {
                return Err(LedgerError::validation(format!(
                    "user '{username}' already exists"
                )));
            }
            let user = User {
                id: state.users.allocate_id()?,
                username,
                password_hash,
                role,
                active: true,
                created_at: Utc::now(),
            };
            state.users.insert(user.clone())?;
            Ok(user)
        })?;
        tracing::debug!(user = %user.id, role = %user.role, "created user");
        self.record_event(
            actor,
            "crear_usuario",
            json!({ "usuario_id": user.id, "username": user.username, "rol": user.role }),
        );
        Ok(user)
    }

    pub fn get_user(&self, user_id: UserId) -> Option<User> {
        self.store.read(|state| state.users.get(user_id).cloned())
    }

    /// Looks an account up by its exact username.
    pub fn find_user(&self, username: &str) -> Option<User> {
        let username = username.trim();
        self.store
            .read(|state| state.users.iter().find(|u| u.username == username).cloned())
    }

    /// All accounts, oldest first.
    pub fn list_users(&self) -> Vec<User> {
        let mut users = self.store.read(|state| state.users.list(|_| true));
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        users
    }

    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] - Unknown user.
    /// - [`LedgerError::Validation`] - Demoting the last active admin.
    pub fn change_role(&self, user_id: UserId, role: Role, actor: &Actor) -> Result<User, LedgerError> {
        let (previous, user) = self.store.transaction(|state| {
            let previous = state.users.require(user_id)?.role;
            if previous == Role::Admin && role != Role::Admin {
                ensure_admin_remains(state, user_id)?;
            }
            let user = state.users.update(user_id, |user| {
                user.role = role;
                Ok(user.clone())
            })?;
            Ok((previous, user))
        })?;
        self.record_event(
            actor,
            "cambiar_rol",
            json!({
                "usuario_id": user_id,
                "username": user.username,
                "rol_anterior": previous,
                "rol_nuevo": role,
            }),
        );
        Ok(user)
    }

    /// Activates or deactivates an account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] - Unknown user.
    /// - [`LedgerError::Validation`] - Deactivating the last active admin.
    pub fn set_user_active(&self, user_id: UserId, active: bool, actor: &Actor) -> Result<User, LedgerError> {
        let user = self.store.transaction(|state| {
            let current = state.users.require(user_id)?;
            if !active && current.active && current.role == Role::Admin {
                ensure_admin_remains(state, user_id)?;
            }
            state.users.update(user_id, |user| {
                user.active = active;
                Ok(user.clone())
            })
        })?;
        let action = if active { "activar_usuario" } else { "desactivar_usuario" };
        self.record_event(
            actor,
            action,
            json!({ "usuario_id": user_id, "username": user.username }),
        );
        Ok(user)
    }

    /// Replaces an account's password.
    pub fn change_password(&self, user_id: UserId, password: &str, actor: &Actor) -> Result<User, LedgerError> {
        self.store.read(|state| state.users.require(user_id).map(|_| ()))?;
        let password_hash = hash_password(password)?;
        let user = self.store.transaction(|state| {
            state.users.update(user_id, |user| {
                user.password_hash = password_hash;
                Ok(user.clone())
            })
        })?;
        self.record_event(
            actor,
            "cambiar_password",
            json!({ "usuario_id": user_id, "username": user.username }),
        );
        Ok(user)
    }
}
