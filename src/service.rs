use tracing::{info, warn};

use crate::database::Database;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::storage::BlobStore;
use crate::upload::UserForm;

const MAX_FIELD_CHARS: usize = 100;

/// Orchestrates the record store and the blob store so that a stored
/// photo reference always points at a written file.
#[derive(Clone)]
pub struct UserService {
    db: Database,
    blobs: BlobStore,
}

impl UserService {
    pub fn new(db: Database, blobs: BlobStore) -> Self {
        Self { db, blobs }
    }

    pub async fn create_user(&self, form: UserForm) -> Result<User> {
        validate_fields(&form.name, &form.email)?;

        let stored_name = match &form.photo {
            Some(file) => Some(self.blobs.put(&file.original_name, &file.data).await?),
            None => None,
        };

        match self
            .db
            .insert_user(&form.name, &form.email, stored_name.as_deref())
            .await
        {
            Ok(user) => {
                info!(id = user.id, "created user");
                Ok(user)
            }
            Err(e) => {
                // Insert failed after the blob was written; drop the orphan.
                if let Some(name) = stored_name {
                    self.discard_blob(&name).await;
                }
                Err(e)
            }
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users().await
    }

    pub async fn get_user(&self, id: i32) -> Result<User> {
        self.db.get_user(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn update_user(&self, id: i32, form: UserForm) -> Result<User> {
        validate_fields(&form.name, &form.email)?;

        // Look up the record first; an unknown id must 404 before any blob
        // is written.
        let existing = self.db.get_user(id).await?.ok_or(AppError::NotFound)?;

        let new_blob = match &form.photo {
            Some(file) => Some(self.blobs.put(&file.original_name, &file.data).await?),
            None => None,
        };

        match self
            .db
            .update_user(id, &form.name, &form.email, new_blob.as_deref())
            .await
        {
            Ok(Some(user)) => {
                // The old photo is unreferenced once the replacement commits.
                if new_blob.is_some() {
                    if let Some(old) = existing.photo {
                        self.discard_blob(&old).await;
                    }
                }
                info!(id = user.id, "updated user");
                Ok(user)
            }
            Ok(None) => {
                // Row vanished between the lookup and the update.
                if let Some(name) = new_blob {
                    self.discard_blob(&name).await;
                }
                Err(AppError::NotFound)
            }
            Err(e) => {
                if let Some(name) = new_blob {
                    self.discard_blob(&name).await;
                }
                Err(e)
            }
        }
    }

    pub async fn delete_user(&self, id: i32) -> Result<User> {
        let user = self.db.delete_user(id).await?.ok_or(AppError::NotFound)?;

        if let Some(photo) = &user.photo {
            self.discard_blob(photo).await;
        }

        info!(id = user.id, "deleted user");
        Ok(user)
    }

    /// Best-effort blob removal for cleanup paths. Failures are logged, not
    /// returned; the record side has already settled.
    async fn discard_blob(&self, stored_name: &str) {
        if let Err(e) = self.blobs.remove(stored_name).await {
            warn!(name = %stored_name, "failed to remove blob: {}", e);
        }
    }
}

fn validate_fields(name: &str, email: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if name.chars().count() > MAX_FIELD_CHARS {
        return Err(AppError::Validation(format!(
            "name must be at most {} characters",
            MAX_FIELD_CHARS
        )));
    }
    if email.trim().is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }
    if email.chars().count() > MAX_FIELD_CHARS {
        return Err(AppError::Validation(format!(
            "email must be at most {} characters",
            MAX_FIELD_CHARS
        )));
    }
    Ok(())
}
