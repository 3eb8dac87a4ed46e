//! Registration and login.
//!
//! # Invariants
//! - Passwords reach storage only as hashes from the `CredentialHasher`.
//! - Unknown usernames and wrong passwords produce the same
//!   `InvalidCredentials` outcome.

use crate::credentials::{CredentialError, CredentialHasher};
use crate::model::now_epoch_ms;
use crate::model::user::{NewUser, User};
use crate::model::validation::ValidationErrors;
use crate::repo::user_repo::{UserRecord, UserRepository};
use crate::repo::{RepoError, RepoResult};
use log::{info, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct IdentityService<R: UserRepository, H: CredentialHasher> {
    repo: R,
    hasher: H,
}

impl<R: UserRepository, H: CredentialHasher> IdentityService<R, H> {
    pub fn new(repo: R, hasher: H) -> Self {
        Self { repo, hasher }
    }

    /// Validates and stores a new account.
    pub fn register(&self, input: &NewUser) -> Result<User, IdentityError> {
        let mut errors = input.validate().err().unwrap_or_default();
        let username = input.username.trim();
        let email = input.email.trim();
        if self.repo.username_exists(username)? {
            errors.push("username", "Username already exists. Please choose a different one.");
        }
        if self.repo.email_exists(email)? {
            errors.push("email", "Email already registered. Please choose a different one.");
        }
        errors.into_result()?;

        let password_hash = self.hasher.hash(&input.password)?;
        let user_id = self.repo.create_user(&UserRecord {
            title: input.title,
            username,
            email,
            first_name: input.first_name.trim(),
            last_name: input.last_name.trim(),
            role: input.role,
            password_hash: &password_hash,
            created_at: now_epoch_ms(),
        })?;
        let user = load(self.repo.get_user(user_id), user_id)?;

        info!(
            "event=user_register module=identity status=ok user={} role={}",
            user.id,
            user.role.as_str()
        );
        Ok(user)
    }

    /// Verifies credentials and records the login time.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, IdentityError> {
        let Some((mut user, hash)) = self.repo.get_credentials(username.trim())? else {
            warn!("event=user_login module=identity status=rejected reason=invalid_credentials");
            return Err(IdentityError::InvalidCredentials);
        };
        if !self.hasher.verify(password, &hash)? {
            warn!("event=user_login module=identity status=rejected reason=invalid_credentials");
            return Err(IdentityError::InvalidCredentials);
        }

        let now = now_epoch_ms();
        self.repo.record_login(user.id, now)?;
        user.last_login = Some(now);
        info!("event=user_login module=identity status=ok user={}", user.id);
        Ok(user)
    }
}

fn load(found: RepoResult<Option<User>>, user_id: i64) -> Result<User, IdentityError> {
    found?
        .ok_or_else(|| IdentityError::Repo(RepoError::not_found("user", user_id)))
}
