pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::auth::dto::{LoginRequest, RegisterRequest};
use crate::auth::identity::ActingIdentity;
use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{NewUser, User};
use crate::config::JwtConfig;
use crate::error::{AppError, AppResult, Violations};
use crate::state::AppState;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{async_trait, extract::{FromRef, FromRequestParts}, http::request::Parts};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, info, warn};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]{1,150}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Argon2id PHC string for `password` with a fresh random salt.
fn seal_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hash password: {e}")))
}

/// A stored hash that does not parse is an internal error, not a mismatch.
fn password_matches(password: &str, stored: &str) -> AppResult<bool> {
    let phc = PasswordHash::new(stored)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("stored password hash: {e}")))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &phc).is_ok())
}

/// Field checks for a registration; `prefix` namespaces field names
/// when the request is nested in a larger form.
pub(crate) fn check_registration(req: &RegisterRequest, prefix: &str, v: &mut Violations) {
    v.check(
        is_valid_username(&req.username),
        &format!("{prefix}username"),
        "letters, digits and @/./+/-/_ only, at most 150 characters",
    );
    v.check(is_valid_email(&req.email), &format!("{prefix}email"), "invalid email");
    v.check(req.password.len() >= 8, &format!("{prefix}password"), "password too short");
}

/// Normalizes and validates a registration, then hashes its password.
pub(crate) fn prepare_user(mut req: RegisterRequest, prefix: &str, is_admin: bool) -> AppResult<NewUser> {
    req.username = req.username.trim().to_string();
    req.email = normalize_email(&req.email);
    let mut v = Violations::new();
    check_registration(&req, prefix, &mut v);
    v.into_result()?;
    Ok(NewUser {
        username: req.username,
        email: req.email,
        password_hash: seal_password(&req.password)?,
        is_admin,
    })
}

/// Self-service sign-up; never grants admin rights.
pub async fn register(users: &dyn UserRepo, req: RegisterRequest) -> AppResult<User> {
    let new = prepare_user(req, "", false)?;

    if users.find_by_email(&new.email).await?.is_some() {
        warn!(email = %new.email, "email already registered");
        return Err(AppError::invalid("email", "email already registered"));
    }

    let user = users.create(&new).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn authenticate(users: &dyn UserRepo, req: LoginRequest) -> AppResult<User> {
    let email = normalize_email(&req.email);
    let Some(user) = users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };
    if !password_matches(&req.password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }
    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            refresh_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs(ttl_minutes * 60),
            refresh_ttl: Duration::from_secs(refresh_ttl_minutes * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, who: ActingIdentity, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: who.id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            adm: who.is_admin,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %who.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, who: ActingIdentity) -> anyhow::Result<String> {
        self.sign_with_kind(who, TokenKind::Access)
    }
    pub fn sign_refresh(&self, who: ActingIdentity) -> anyhow::Result<String> {
        self.sign_with_kind(who, TokenKind::Refresh)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

impl User {
    pub fn identity(&self) -> ActingIdentity {
        ActingIdentity {
            id: self.id,
            is_admin: self.is_admin,
        }
    }
}

/// Bearer-token extractor yielding the caller's identity.
///
/// Tokens claiming admin rights are checked against the stored user, so a
/// demotion applies before the token expires.
pub struct AuthUser(pub ActingIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    Arc<dyn UserRepo>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err(AppError::Unauthorized("Invalid or expired token".into()));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        if !claims.adm {
            return Ok(AuthUser(ActingIdentity { id: claims.sub, is_admin: false }));
        }
        let users = <Arc<dyn UserRepo> as FromRef<S>>::from_ref(state);
        let Some(user) = users.find_by_id(claims.sub).await? else {
            warn!(user_id = %claims.sub, "token for unknown user");
            return Err(AppError::Unauthorized("User not found".into()));
        };
        if !user.is_admin {
            debug!(user_id = %user.id, "admin claim no longer held");
        }
        Ok(AuthUser(user.identity()))
    }
}
