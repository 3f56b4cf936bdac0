// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use crate::identity::IdentityVerifier;
use crate::proto::{LoginLabInfo, LoginResponse, Role, User};
use crate::repository::{LabRepository, RoleRepository, UserRepository};
use crate::store::DocumentStore;

use super::unix_now;

/// Display name given to users on first login.
pub const NEW_USER_NAME: &str = "新用户";
/// Role preferred for a user landing in a lab.
pub const PREFERRED_ROLE: &str = "学生";

pub struct UserService {
    users: UserRepository,
    labs: LabRepository,
    roles: RoleRepository,
    verifier: Arc<dyn IdentityVerifier>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            users: UserRepository::new(Arc::clone(&store)),
            labs: LabRepository::new(Arc::clone(&store)),
            roles: RoleRepository::new(store),
            verifier,
        }
    }

    /// Resolve a login code to a user and the lab they land in, creating the
    /// user on first sight.
    pub async fn login(&self, js_code: &str) -> anyhow::Result<LoginResponse> {
        info!("processing login");
        let identity = self
            .verifier
            .exchange_code(js_code)
            .await
            .context("failed to validate wechat code")?;
        let user = self
            .find_or_create_user(&identity.open_id)
            .await
            .context("failed to find or create user")?;
        let lab_info = self.lab_info().await.context("failed to get user lab info")?;

        info!(user_id = %user.id, "login successful");
        Ok(LoginResponse { user: Some(user), lab_info: Some(lab_info) })
    }

    pub async fn find_or_create_user(&self, open_id: &str) -> anyhow::Result<User> {
        if let Some(user) = self.users.find_by_open_id(open_id).await? {
            info!(user_id = %user.id, "found existing user");
            return Ok(user);
        }

        let now = unix_now();
        let user = User {
            id: format!("user_{}", Uuid::new_v4().simple()),
            name: NEW_USER_NAME.to_owned(),
            open_id: open_id.to_owned(),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };
        self.users.create(&user).await.context("failed to create user")?;
        info!(user_id = %user.id, "created new user");
        Ok(user)
    }

    async fn lab_info(&self) -> anyhow::Result<LoginLabInfo> {
        let lab = self
            .labs
            .default_lab()
            .await
            .context("failed to get default lab")?
            .context("failed to get default lab: no labs configured")?;
        let roles = self.roles.by_lab_id(&lab.id).await.context("failed to get lab roles")?;
        let role = default_user_role(&roles).cloned().context("failed to get user role")?;

        Ok(LoginLabInfo {
            lab: Some(lab),
            roles,
            user_role_id: role.id.clone(),
            user_role: Some(role),
        })
    }
}

/// The preferred role if the lab has one, else the lab's first role.
pub fn default_user_role(roles: &[Role]) -> Option<&Role> {
    roles.iter().find(|r| r.name == PREFERRED_ROLE).or_else(|| roles.first())
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
