use axum::{extract::State, Json};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::{AppError, AppResult},
    models::{Delegation, NewDelegation, Profile},
    schema::delegations,
    state::AppState,
    validation,
};

use super::employees::find_employee;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDelegationRequest {
    pub delegated_by: Uuid,
    pub delegated_to: Uuid,
    pub start_at: NaiveDate,
    pub end_at: NaiveDate,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRead {
    #[serde(rename = "delegationID")]
    pub delegation_id: Uuid,
    pub delegated_by: Uuid,
    pub delegated_to: Uuid,
    pub start_at: NaiveDate,
    pub end_at: NaiveDate,
}

fn delegation_to_read(delegation: Delegation) -> DelegationRead {
    DelegationRead {
        delegation_id: delegation.id,
        delegated_by: delegation.delegated_by,
        delegated_to: delegation.delegated_to,
        start_at: delegation.start_at,
        end_at: delegation.end_at,
    }
}

pub async fn list_delegations(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<DelegationRead>>> {
    let mut conn = state.db()?;
    let rows: Vec<Delegation> = delegations::table
        .order(delegations::start_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(delegation_to_read).collect()))
}

pub async fn create_delegation(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateDelegationRequest>,
) -> AppResult<Json<DelegationRead>> {
    user.require_profile(&[Profile::Administrator, Profile::Supervisor])?;
    validation::validate_date_range(payload.start_at, payload.end_at)?;

    if payload.delegated_by == payload.delegated_to {
        return Err(AppError::bad_request(
            "an employee cannot delegate to themselves",
        ));
    }

    let mut conn = state.db()?;
    let delegation = conn.transaction::<Delegation, AppError, _>(|conn| {
        let delegator = find_employee(conn, payload.delegated_by)?;
        let delegate = find_employee(conn, payload.delegated_to)?;
        if delegator.is_none() || delegate.is_none() {
            return Err(AppError::bad_request(
                "one or more of the specified employees do not exist",
            ));
        }

        let new_delegation = NewDelegation {
            id: Uuid::new_v4(),
            delegated_by: payload.delegated_by,
            delegated_to: payload.delegated_to,
            start_at: payload.start_at,
            end_at: payload.end_at,
        };

        diesel::insert_into(delegations::table)
            .values(&new_delegation)
            .execute(conn)?;

        Ok(delegations::table.find(new_delegation.id).first(conn)?)
    })?;

    Ok(Json(delegation_to_read(delegation)))
}
