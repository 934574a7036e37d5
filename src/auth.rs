use async_trait::async_trait;
use chrono::{Duration, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use std::ops::Add;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::err::Error;
use crate::models::{Session, UserData};
use crate::schema::{validate_credentials, Field};
use crate::store::BackendError;

pub const SESSION_DAYS: i64 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new<S: Into<String>>(email: S, password: S) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn email(&self) -> &str {
        self.email.trim()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedUser {
    pub user_id: Uuid,
}

/// Session lifecycle. Everything past sign-in is keyed by the [`Session`]
/// this hands out.
#[async_trait]
pub trait AuthGate: Send + Sync {
    async fn sign_up(&self, credentials: &Credentials) -> Result<CreatedUser, Error>;

    /// Reuses a live session of the same user when one exists.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, Error>;

    async fn sign_out(&self, session: &Session) -> Result<(), Error>;

    /// Resolves a session id. Expired sessions are removed and come back as
    /// `None`.
    async fn current_user(&self, ssid: &str) -> Result<Option<Session>, Error>;
}

fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Pbkdf2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn password_matches(password: &str, password_hash: &str) -> Result<bool, Error> {
    let hash = PasswordHash::new(password_hash)?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok())
}

fn wrong_credentials() -> Error {
    Error::Authentication {
        message: "Email ou senha inválidos".to_string(),
    }
}

/// The only unique column of `users` besides its random key is `email`, so a
/// unique violation on insert means a concurrent sign-up took the address.
fn sign_up_error(err: BackendError) -> Error {
    if err.is_unique_violation() {
        log::debug!("sign-up lost the race for an email: {}", err);
        return Error::duplicate(Some(Field::Email));
    }
    Error::transport("DatabaseError", err.to_string())
}

fn new_session(user: Uuid, ttl: Duration) -> Session {
    let ssid_bytes: [u8; 32] = thread_rng().gen();

    let mut hasher: Sha256 = Digest::new();
    hasher.update(&ssid_bytes);
    let ssid = hex::encode(hasher.finalize());

    Session {
        ssid,
        belongs_to: user,
        expires_at: Utc::now().add(ttl),
    }
}

pub struct PgAuth {
    pg: PgPool,
    ttl: Duration,
}

impl PgAuth {
    pub fn new(pg: PgPool, session_days: i64) -> Self {
        Self {
            pg,
            ttl: Duration::days(session_days),
        }
    }
}

#[async_trait]
impl AuthGate for PgAuth {
    async fn sign_up(&self, credentials: &Credentials) -> Result<CreatedUser, Error> {
        validate_credentials(&credentials.email, &credentials.password)?;

        let user = sqlx::query_as::<_, UserData>("SELECT * FROM users WHERE email = $1 LIMIT 1")
            .bind(credentials.email())
            .fetch_optional(&self.pg)
            .await?;
        if user.is_some() {
            return Err(Error::duplicate(Some(Field::Email)));
        }

        let user = UserData {
            uuid: Uuid::new_v4(),
            email: credentials.email().to_string(),
            password_hash: hash_password(&credentials.password)?,
            created_at: Utc::now(),
        };

        let res = sqlx::query("INSERT INTO users VALUES ($1, $2, $3, $4)")
            .bind(user.uuid)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .execute(&self.pg)
            .await
            .map_err(|err| sign_up_error(err.into()))?;

        if res.rows_affected() < 1 {
            return Err(Error::transport(
                "DatabaseError",
                "Could not save data to database!",
            ));
        }
        log::info!("registered user {}", user.uuid);
        Ok(CreatedUser { user_id: user.uuid })
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, Error> {
        validate_credentials(&credentials.email, &credentials.password)?;

        let user = sqlx::query_as::<_, UserData>("SELECT * FROM users WHERE email = $1 LIMIT 1")
            .bind(credentials.email())
            .fetch_optional(&self.pg)
            .await?
            .ok_or_else(wrong_credentials)?;

        if !password_matches(&credentials.password, &user.password_hash)? {
            return Err(wrong_credentials());
        }

        let existing = sqlx::query_as::<_, Session>(
            "SELECT * FROM user_sessions WHERE belongs_to = $1 AND expires_at > now() LIMIT 1",
        )
        .bind(user.uuid)
        .fetch_optional(&self.pg)
        .await?;

        if let Some(existing) = existing {
            // already authenticated
            return Ok(existing);
        }

        let session = new_session(user.uuid, self.ttl);
        let res = sqlx::query("INSERT INTO user_sessions VALUES($1, $2, $3)")
            .bind(&session.ssid)
            .bind(session.expires_at)
            .bind(session.belongs_to)
            .execute(&self.pg)
            .await?;

        if res.rows_affected() < 1 {
            return Err(Error::transport(
                "DatabaseError",
                "Could not update session ids!",
            ));
        }
        Ok(session)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), Error> {
        sqlx::query("DELETE FROM user_sessions WHERE ssid = $1 AND belongs_to = $2")
            .bind(&session.ssid)
            .bind(session.belongs_to)
            .execute(&self.pg)
            .await?;
        Ok(())
    }

    async fn current_user(&self, ssid: &str) -> Result<Option<Session>, Error> {
        if ssid.is_empty() {
            return Ok(None);
        }
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM user_sessions WHERE ssid = $1 LIMIT 1",
        )
        .bind(ssid)
        .fetch_optional(&self.pg)
        .await?;

        match session {
            Some(session) if session.is_expired() => {
                sqlx::query("DELETE FROM user_sessions WHERE ssid = $1")
                    .bind(ssid)
                    .execute(&self.pg)
                    .await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

/// Users and sessions kept in process.
pub struct MemoryAuth {
    users: Mutex<HashMap<String, UserData>>,
    sessions: Mutex<HashMap<String, Session>>,
    ttl: Duration,
}

impl MemoryAuth {
    pub fn new(session_days: i64) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::days(session_days),
        }
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new(SESSION_DAYS)
    }
}

#[async_trait]
impl AuthGate for MemoryAuth {
    async fn sign_up(&self, credentials: &Credentials) -> Result<CreatedUser, Error> {
        validate_credentials(&credentials.email, &credentials.password)?;

        let mut users = self.users.lock().await;
        if users.contains_key(credentials.email()) {
            return Err(Error::duplicate(Some(Field::Email)));
        }
        let user = UserData {
            uuid: Uuid::new_v4(),
            email: credentials.email().to_string(),
            password_hash: hash_password(&credentials.password)?,
            created_at: Utc::now(),
        };
        let created = CreatedUser { user_id: user.uuid };
        users.insert(user.email.clone(), user);
        Ok(created)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, Error> {
        validate_credentials(&credentials.email, &credentials.password)?;

        let user = {
            let users = self.users.lock().await;
            users
                .get(credentials.email())
                .cloned()
                .ok_or_else(wrong_credentials)?
        };
        if !password_matches(&credentials.password, &user.password_hash)? {
            return Err(wrong_credentials());
        }

        let mut sessions = self.sessions.lock().await;
        let existing = sessions
            .values()
            .find(|session| session.belongs_to == user.uuid && !session.is_expired())
            .cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }
        let session = new_session(user.uuid, self.ttl);
        sessions.insert(session.ssid.clone(), session.clone());
        Ok(session)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().await;
        let owned = sessions
            .get(&session.ssid)
            .map(|stored| stored.belongs_to == session.belongs_to)
            .unwrap_or(false);
        if owned {
            sessions.remove(&session.ssid);
        }
        Ok(())
    }

    async fn current_user(&self, ssid: &str) -> Result<Option<Session>, Error> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(ssid).cloned() {
            Some(session) if session.is_expired() => {
                sessions.remove(ssid);
                Ok(None)
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_hex_sha256() {
        let session = new_session(Uuid::nil(), Duration::days(SESSION_DAYS));
        assert_eq!(session.ssid.len(), 64);
        assert!(session.ssid.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!session.is_expired());
        assert_ne!(session.ssid, new_session(Uuid::nil(), Duration::days(1)).ssid);
    }

    #[test]
    fn hashes_verify() {
        let hash = hash_password("segredo").unwrap();
        assert!(password_matches("segredo", &hash).unwrap());
        assert!(!password_matches("outro", &hash).unwrap());
    }

    #[tokio::test]
    async fn sign_up_sign_in_sign_out() {
        let auth = MemoryAuth::default();
        let created = auth.sign_up(&Credentials::new("ana@x.com", "segredo")).await.unwrap();

        let session = auth.sign_in(&Credentials::new(" ana@x.com ", "segredo")).await.unwrap();
        assert_eq!(session.belongs_to, created.user_id);
        let again = auth.sign_in(&Credentials::new("ana@x.com", "segredo")).await.unwrap();
        assert_eq!(again.ssid, session.ssid);

        let current = auth.current_user(&session.ssid).await.unwrap();
        assert_eq!(current.as_ref(), Some(&session));

        auth.sign_out(&session).await.unwrap();
        assert_eq!(auth.current_user(&session.ssid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_bad_input_and_wrong_password() {
        let auth = MemoryAuth::default();
        let err = auth.sign_up(&Credentials::new("ana@x.com", "123")).await.unwrap_err();
        assert_eq!(err.to_string(), "Senha deve ter no mínimo 6 caracteres");

        auth.sign_up(&Credentials::new("ana@x.com", "segredo")).await.unwrap();
        let err = auth.sign_up(&Credentials::new("ana@x.com", "segredo")).await.unwrap_err();
        assert_eq!(err, Error::duplicate(Some(Field::Email)));

        let err = auth.sign_in(&Credentials::new("ana@x.com", "errada")).await.unwrap_err();
        assert_eq!(err, wrong_credentials());
        let err = auth.sign_in(&Credentials::new("bia@x.com", "segredo")).await.unwrap_err();
        assert_eq!(err, wrong_credentials());
    }

    #[test]
    fn concurrent_sign_up_is_a_duplicate() {
        let err = sign_up_error(BackendError::unique_violation("users_email_key"));
        assert_eq!(err, Error::duplicate(Some(Field::Email)));

        let err = sign_up_error(BackendError::other("connection reset"));
        assert_eq!(err, Error::transport("DatabaseError", "connection reset"));
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let auth = MemoryAuth::new(-1);
        auth.sign_up(&Credentials::new("ana@x.com", "segredo")).await.unwrap();
        let session = auth.sign_in(&Credentials::new("ana@x.com", "segredo")).await.unwrap();
        assert_eq!(auth.current_user(&session.ssid).await.unwrap(), None);
        assert_eq!(auth.current_user("").await.unwrap(), None);
    }
}
