//! Session tokens and credential checks.
//!
//! A session is an HS256 JWT carrying the user id and role, valid for a fixed
//! lifetime after issuance. Passwords are stored as bcrypt hashes; hashing and
//! verification run on the blocking thread pool.

use actix_web::web;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    error::ApiError,
    models::{NewUser, User, UserRole, DEFAULT_COMPANY_ID},
    store::{Store, StoreError},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

/// Signing secret, token lifetime and password hashing cost shared by
/// issuer and verifier.
#[derive(Clone)]
pub struct Sessions {
    secret: String,
    lifetime: Duration,
    bcrypt_cost: u32,
}

/// A freshly issued token together with the user it belongs to.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_hint: Option<String>,
}

impl Sessions {
    pub fn new(secret: impl Into<String>, lifetime: Duration, bcrypt_cost: u32) -> Self {
        Self {
            secret: secret.into(),
            lifetime,
            bcrypt_cost,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        self.issue_at(user, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user: &User, issued_at: OffsetDateTime) -> Result<String, ApiError> {
        let claims = Claims {
            user_id: user.id,
            role: user.role,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + self.lifetime).unix_timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|err| ApiError::Internal(format!("failed to sign session token: {err}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| {
            warn!("Rejected session token: {err}");
            ApiError::AuthInvalid
        })
    }

    pub async fn hash_password(&self, password: String) -> Result<String, ApiError> {
        let cost = self.bcrypt_cost;
        web::block(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?
            .map_err(|err| ApiError::Internal(format!("failed to hash password: {err}")))
    }

    pub async fn verify_password(&self, password: String, hash: String) -> Result<bool, ApiError> {
        let verified = web::block(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;

        // An unparsable stored hash never matches.
        Ok(verified.unwrap_or_else(|err| {
            warn!("Stored password hash is unusable: {err}");
            false
        }))
    }
}

/// Checks an email/password pair and issues a session for the matching user.
pub async fn authenticate(
    store: &dyn Store,
    sessions: &Sessions,
    email: &str,
    password: &str,
) -> Result<Session, ApiError> {
    let user = store.find_user_by_email(email).await?.ok_or_else(|| {
        warn!("Login attempt for unknown email {email}");
        ApiError::UnknownAccount
    })?;

    if !sessions
        .verify_password(password.to_string(), user.password_hash.clone())
        .await?
    {
        warn!("Invalid password for user {}", user.id);
        return Err(ApiError::InvalidCredential);
    }

    let token = sessions.issue(&user)?;
    info!("User {} logged in", user.id);

    Ok(Session { token, user })
}

/// Creates a user and immediately issues a session for it.
pub async fn register(
    store: &dyn Store,
    sessions: &Sessions,
    registration: Registration,
) -> Result<Session, ApiError> {
    if store.find_user_by_email(&registration.email).await?.is_some() {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = sessions.hash_password(registration.password).await?;
    let user = store
        .insert_user(NewUser {
            name: registration.name,
            email: registration.email,
            password_hash,
            role: UserRole::from_hint(registration.role_hint.as_deref()),
            company_id: DEFAULT_COMPANY_ID,
        })
        .await
        .map_err(|err| match err {
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            other => ApiError::from(other).during("creating account"),
        })?;

    let token = sessions.issue(&user)?;
    info!("Registered user {} as {:?}", user.id, user.role);

    Ok(Session { token, user })
}

/// Recovers the acting user from an `Authorization` header value.
pub async fn resolve(
    store: &dyn Store,
    sessions: &Sessions,
    authorization: Option<&str>,
) -> Result<User, ApiError> {
    let authorization = authorization
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::AuthMissing)?;

    let token = authorization
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(ApiError::AuthInvalid)?;

    let claims = sessions.verify(token)?;

    store.find_user(claims.user_id).await?.ok_or_else(|| {
        warn!("Session token refers to missing user {}", claims.user_id);
        ApiError::AuthInvalid
    })
}
