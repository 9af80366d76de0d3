use axum::{extract::State, Form, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{authenticate, CurrentUser},
    error::{AppError, AppResult},
    state::AppState,
};

use super::accounts::{account_to_read, AccountRead};

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: LoginUser,
}

#[derive(Serialize)]
pub struct LoginUser {
    pub username: String,
    pub profile: String,
    #[serde(rename = "employeeID")]
    pub employee_id: Uuid,
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;

    let account = authenticate(&mut conn, &form.username, &form.password)?;
    let access_token = state.jwt.generate_token(&account).map_err(AppError::from)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.config.jwt_expiry_minutes * 60,
        user: LoginUser {
            username: account.username,
            profile: account.profile,
            employee_id: account.employee_id,
        },
    }))
}

pub async fn me(user: CurrentUser) -> Json<AccountRead> {
    Json(account_to_read(user.account))
}
