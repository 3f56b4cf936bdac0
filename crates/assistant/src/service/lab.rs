// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use crate::proto::{Lab, Role, User};
use crate::repository::{LabRepository, RoleRepository, UserRepository};
use crate::store::DocumentStore;

use super::unix_now;

pub struct LabService {
    labs: LabRepository,
    users: UserRepository,
    roles: RoleRepository,
}

impl LabService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            labs: LabRepository::new(Arc::clone(&store)),
            users: UserRepository::new(Arc::clone(&store)),
            roles: RoleRepository::new(store),
        }
    }

    /// Store a new lab, assigning an id and creation time when missing.
    pub async fn create_lab(&self, mut lab: Lab) -> anyhow::Result<Lab> {
        if lab.id.is_empty() {
            lab.id = format!("lab_{}", Uuid::new_v4().simple());
        }
        if lab.created_at == 0 {
            lab.created_at = unix_now();
        }
        info!(lab_id = %lab.id, "creating lab");
        self.labs.create(&lab).await.context("failed to create lab")?;
        Ok(lab)
    }

    pub async fn lab_roles(&self, lab_id: &str) -> anyhow::Result<Vec<Role>> {
        self.roles.by_lab_id(lab_id).await.context("failed to get lab roles")
    }

    /// A lab together with the users who belong to it.
    pub async fn lab_with_users(&self, lab_id: &str) -> anyhow::Result<(Lab, Vec<User>)> {
        let lab = self
            .labs
            .find_by_id(lab_id)
            .await
            .context("failed to get lab")?
            .with_context(|| format!("failed to get lab: {lab_id} not found"))?;
        let users = self.users.find_by_lab_id(lab_id).await.context("failed to get lab users")?;
        Ok((lab, users))
    }
}

#[cfg(test)]
#[path = "lab_tests.rs"]
mod tests;
