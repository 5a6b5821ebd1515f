use tracing::info;

use crate::config::SeedConfig;
use crate::database::Database;
use crate::error::AppResult;
use crate::models::{Role, User};
use crate::services::auth::hash_password;

/// Creates the administrator account unless a user with that email exists.
pub async fn seed_admin(db: &Database, seed: &SeedConfig) -> AppResult<()> {
    if User::exists_with_email(&seed.admin_email, &db.pool).await? {
        info!("Admin user already exists, skipping seed");
        return Ok(());
    }

    let hash = hash_password(&seed.admin_password).await?;
    let admin = User::create(&seed.admin_name, &seed.admin_email, &hash, Role::Admin, &db.pool).await?;
    info!(user_id = %admin.id, email = %admin.email, "Admin user created");
    Ok(())
}
