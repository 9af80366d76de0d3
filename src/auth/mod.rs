pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::Utc;
use diesel::prelude::*;

use crate::{
    error::{AppError, AppResult},
    models::{Account, Profile},
    schema::accounts,
    state::AppState,
};

/// The authenticated principal, resolved from the bearer token. Every
/// protected handler takes this as an explicit argument; authorization is a
/// direct profile check against it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account: Account,
}

impl CurrentUser {
    pub fn profile(&self) -> Profile {
        Profile::parse(&self.account.profile).unwrap_or(Profile::Validator)
    }

    pub fn has_profile(&self, allowed: &[Profile]) -> bool {
        allowed.contains(&self.profile())
    }

    pub fn require_profile(&self, allowed: &[Profile]) -> AppResult<()> {
        if self.has_profile(allowed) {
            return Ok(());
        }
        let names: Vec<&str> = allowed.iter().map(|profile| profile.as_str()).collect();
        Err(AppError::forbidden(format!(
            "requires profile: {}",
            names.join(", ")
        )))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        let mut conn = state.db()?;
        let account: Account = accounts::table
            .filter(accounts::username.eq(&claims.sub))
            .first(&mut conn)
            .map_err(|_| AppError::unauthorized())?;

        if !account.is_active {
            return Err(AppError::unauthorized());
        }

        Ok(CurrentUser { account })
    }
}

/// Verifies credentials and, on success, records the login time. The
/// `last_login` write is a deliberate part of the authentication contract:
/// a successful login always leaves a last-seen timestamp behind.
pub fn authenticate(
    conn: &mut PgConnection,
    username: &str,
    password: &str,
) -> AppResult<Account> {
    let account: Option<Account> = accounts::table
        .filter(accounts::username.eq(username))
        .first(conn)
        .optional()?;

    let Some(account) = account else {
        // Unknown usernames still pay for one argon2 pass so both failure
        // paths take the same time.
        let _ = password::hash_password(password);
        return Err(AppError::unauthorized());
    };

    let valid = password::verify_password(password, &account.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid || !account.is_active {
        return Err(AppError::unauthorized());
    }

    let account = diesel::update(accounts::table.find(account.id))
        .set(accounts::last_login.eq(Utc::now().naive_utc()))
        .get_result(conn)?;

    Ok(account)
}
