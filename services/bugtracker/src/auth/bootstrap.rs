//! Startup seeding of the first administrator.
//!
//! Every account endpoint requires an authenticated staff, manager, or team
//! lead, so a fresh deployment needs one account created out of band. When
//! `BUGTRACKER_ADMIN_*` is configured the service creates it on startup.
use crate::auth::passwords::hash_password_blocking;
use crate::config::AdminSeed;
use crate::model::{Dept, NewUser, Role, User};
use crate::store::{BugTrackerStore, StoreError};
use anyhow::Context;

/// Creates the seed admin unless a user with that username already exists.
///
/// Returns the created user, or `None` when seeding was skipped.
pub async fn seed_admin(
    store: &(dyn BugTrackerStore + Send + Sync),
    seed: &AdminSeed,
) -> anyhow::Result<Option<User>> {
    let existing = store
        .find_user_by_username(&seed.username)
        .await
        .context("look up seed admin")?;
    if existing.is_some() {
        tracing::debug!(username = %seed.username, "seed admin already present");
        return Ok(None);
    }
    let password_hash = hash_password_blocking(seed.password.clone())
        .await
        .context("hash seed admin password")?;
    let created = store
        .create_user(NewUser {
            username: seed.username.clone(),
            email: seed.email.clone(),
            password_hash,
            name: None,
            phone_number: None,
            role: Role::Manager,
            dept: Dept::Management,
            is_staff: true,
        })
        .await;
    match created {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "seed admin created");
            Ok(Some(user))
        }
        // Lost a race with another replica, or the email is taken.
        Err(StoreError::Conflict(message)) => {
            tracing::warn!(username = %seed.username, %message, "seed admin not created");
            Ok(None)
        }
        Err(err) => Err(err).context("create seed admin"),
    }
}
