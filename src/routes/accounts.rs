use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{password, CurrentUser},
    error::{AppError, AppResult},
    models::{Account, NewAccount, Profile},
    schema::accounts,
    state::AppState,
    utils::json::Patch,
};

use super::employees::find_employee;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[serde(rename = "employeeID")]
    pub employee_id: Uuid,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub reset_token: Patch<String>,
    #[serde(default)]
    pub reset_token_expiry: Patch<NaiveDateTime>,
}

/// Account as exposed over the wire. The password hash never leaves the
/// server.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRead {
    #[serde(rename = "accountID")]
    pub account_id: Uuid,
    #[serde(rename = "employeeID")]
    pub employee_id: Uuid,
    pub username: String,
    pub profile: String,
    pub is_active: bool,
    pub last_login: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub(super) fn account_to_read(account: Account) -> AccountRead {
    AccountRead {
        account_id: account.id,
        employee_id: account.employee_id,
        username: account.username,
        profile: account.profile,
        is_active: account.is_active,
        last_login: account.last_login,
        created_at: account.created_at,
        updated_at: account.updated_at,
    }
}

pub async fn list_accounts(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<AccountRead>>> {
    user.require_profile(&[Profile::Administrator])?;

    let mut conn = state.db()?;
    let rows: Vec<Account> = accounts::table
        .order(accounts::username.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(account_to_read).collect()))
}

pub async fn get_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(account_id): Path<Uuid>,
) -> AppResult<Json<AccountRead>> {
    user.require_profile(&[Profile::Administrator])?;

    let mut conn = state.db()?;
    let account: Account = accounts::table
        .find(account_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("account not found"))?;
    Ok(Json(account_to_read(account)))
}

pub async fn create_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateAccountRequest>,
) -> AppResult<Json<AccountRead>> {
    user.require_profile(&[Profile::Administrator])?;

    let password_hash = password::hash_password(&payload.password)?;

    let mut conn = state.db()?;
    let account = conn.transaction::<Account, AppError, _>(|conn| {
        find_employee(conn, payload.employee_id)?
            .ok_or_else(|| AppError::bad_request("the specified employee does not exist"))?;

        let employee_taken: Option<Account> = accounts::table
            .filter(accounts::employee_id.eq(payload.employee_id))
            .first(conn)
            .optional()?;
        if employee_taken.is_some() {
            return Err(AppError::conflict(
                "this employee already has an account",
            ));
        }

        let username_taken: Option<Account> = accounts::table
            .filter(accounts::username.eq(&payload.username))
            .first(conn)
            .optional()?;
        if username_taken.is_some() {
            return Err(AppError::conflict(
                "an account with this username already exists",
            ));
        }

        let new_account = NewAccount {
            id: Uuid::new_v4(),
            employee_id: payload.employee_id,
            username: payload.username,
            password_hash,
            profile: payload
                .profile
                .unwrap_or(Profile::Validator)
                .as_str()
                .to_string(),
            is_active: payload.is_active.unwrap_or(true),
        };

        diesel::insert_into(accounts::table)
            .values(&new_account)
            .execute(conn)?;

        Ok(accounts::table.find(new_account.id).first(conn)?)
    })?;

    Ok(Json(account_to_read(account)))
}

pub async fn update_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<UpdateAccountRequest>,
) -> AppResult<Json<AccountRead>> {
    user.require_profile(&[Profile::Administrator])?;

    let password_hash = match payload.password {
        Some(password) => Some(password::hash_password(&password)?),
        None => None,
    };

    let mut conn = state.db()?;
    let account = conn.transaction::<Account, AppError, _>(|conn| {
        let existing: Account = accounts::table
            .find(account_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found("account not found"))?;

        let username = match payload.username {
            Some(username) => {
                if username != existing.username {
                    let duplicate: Option<Account> = accounts::table
                        .filter(accounts::username.eq(&username))
                        .filter(accounts::id.ne(account_id))
                        .first(conn)
                        .optional()?;
                    if duplicate.is_some() {
                        return Err(AppError::conflict(
                            "an account with this username already exists",
                        ));
                    }
                }
                username
            }
            None => existing.username,
        };

        let updated = diesel::update(accounts::table.find(account_id))
            .set((
                accounts::username.eq(username),
                accounts::password_hash.eq(password_hash.unwrap_or(existing.password_hash)),
                accounts::profile.eq(payload
                    .profile
                    .map(|profile| profile.as_str().to_string())
                    .unwrap_or(existing.profile)),
                accounts::is_active.eq(payload.is_active.unwrap_or(existing.is_active)),
                accounts::reset_token.eq(payload.reset_token.resolve(existing.reset_token)),
                accounts::reset_token_expiry
                    .eq(payload.reset_token_expiry.resolve(existing.reset_token_expiry)),
            ))
            .get_result(conn)?;

        Ok(updated)
    })?;

    Ok(Json(account_to_read(account)))
}

pub async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(account_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_profile(&[Profile::Administrator])?;

    let mut conn = state.db()?;
    let deleted = diesel::delete(accounts::table.find(account_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found("account not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
