use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::{dsl::exists, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    approvals,
    auth::CurrentUser,
    error::{AppError, AppResult},
    lifecycle::RequestStatus,
    models::{NewRequest, NewRequestEmployee, Profile, Request, RequestEmployee},
    schema::{request_employees, requests, workflows},
    state::AppState,
    utils::json::Patch,
    validation,
};

use super::employees::find_employee;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestRequest {
    #[serde(rename = "employeeID")]
    pub employee_id: Uuid,
    pub request_date: NaiveDate,
    #[serde(default)]
    pub previous_start: Option<NaiveTime>,
    #[serde(default)]
    pub previous_end: Option<NaiveTime>,
    pub start_at: NaiveTime,
    pub end_at: NaiveTime,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestRequest {
    #[serde(default)]
    pub request_date: Option<NaiveDate>,
    #[serde(default)]
    pub previous_start: Patch<NaiveTime>,
    #[serde(default)]
    pub previous_end: Patch<NaiveTime>,
    #[serde(default)]
    pub start_at: Option<NaiveTime>,
    #[serde(default)]
    pub end_at: Option<NaiveTime>,
    #[serde(default)]
    pub status: Option<RequestStatus>,
    #[serde(default)]
    pub comment: Patch<String>,
}

#[derive(Deserialize)]
pub struct AttachEmployeeRequest {
    #[serde(rename = "employeeID")]
    pub employee_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRead {
    #[serde(rename = "requestID")]
    pub request_id: Uuid,
    #[serde(rename = "employeeID")]
    pub employee_id: Uuid,
    pub request_date: NaiveDate,
    pub previous_start: Option<NaiveTime>,
    pub previous_end: Option<NaiveTime>,
    pub start_at: NaiveTime,
    pub end_at: NaiveTime,
    pub status: String,
    pub comment: Option<String>,
    pub created_by: Option<Uuid>,
    pub validated_n1_at: Option<NaiveDateTime>,
    pub validated_n2_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEmployeeRead {
    pub id: Uuid,
    #[serde(rename = "requestID")]
    pub request_id: Uuid,
    #[serde(rename = "employeeID")]
    pub employee_id: Uuid,
    pub total_hours: f64,
}

fn request_to_read(request: Request) -> RequestRead {
    RequestRead {
        request_id: request.id,
        employee_id: request.employee_id,
        request_date: request.request_date,
        previous_start: request.previous_start,
        previous_end: request.previous_end,
        start_at: request.start_at,
        end_at: request.end_at,
        status: request.status,
        comment: request.comment,
        created_by: request.created_by,
        validated_n1_at: request.validated_n1_at,
        validated_n2_at: request.validated_n2_at,
        created_at: request.created_at,
        updated_at: request.updated_at,
    }
}

fn link_to_read(link: RequestEmployee) -> RequestEmployeeRead {
    RequestEmployeeRead {
        id: link.id,
        request_id: link.request_id,
        employee_id: link.employee_id,
        total_hours: link.total_hours,
    }
}

fn validate_previous_pair(
    previous_start: Option<NaiveTime>,
    previous_end: Option<NaiveTime>,
) -> AppResult<()> {
    match (previous_start, previous_end) {
        (Some(start), Some(end)) => validation::validate_time_range(start, end),
        (None, None) => Ok(()),
        _ => Err(AppError::bad_request(
            "previousStart and previousEnd must be provided together",
        )),
    }
}

pub async fn list_requests(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<RequestRead>>> {
    let mut conn = state.db()?;
    let rows: Vec<Request> = requests::table
        .order(requests::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(request_to_read).collect()))
}

pub async fn get_request(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<RequestRead>> {
    let mut conn = state.db()?;
    let request: Request = requests::table
        .find(request_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("request not found"))?;
    Ok(Json(request_to_read(request)))
}

pub async fn create_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateRequestRequest>,
) -> AppResult<Json<RequestRead>> {
    validation::validate_request_date(payload.request_date)?;
    validation::validate_working_hours(payload.start_at, payload.end_at)?;
    validate_previous_pair(payload.previous_start, payload.previous_end)?;

    let mut conn = state.db()?;
    let request = conn.transaction::<Request, AppError, _>(|conn| {
        find_employee(conn, payload.employee_id)?
            .ok_or_else(|| AppError::bad_request("the specified employee does not exist"))?;

        let new_request = NewRequest {
            id: Uuid::new_v4(),
            employee_id: payload.employee_id,
            request_date: payload.request_date,
            previous_start: payload.previous_start,
            previous_end: payload.previous_end,
            start_at: payload.start_at,
            end_at: payload.end_at,
            status: RequestStatus::Pending.as_str().to_string(),
            comment: payload.comment,
            // The filer is always the authenticated caller, never
            // whatever the payload claims.
            created_by: Some(user.account.employee_id),
        };

        diesel::insert_into(requests::table)
            .values(&new_request)
            .execute(conn)?;

        Ok(requests::table.find(new_request.id).first(conn)?)
    })?;

    Ok(Json(request_to_read(request)))
}

pub async fn update_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<UpdateRequestRequest>,
) -> AppResult<Json<RequestRead>> {
    let mut conn = state.db()?;
    let request = conn.transaction::<Request, AppError, _>(|conn| {
        // Row lock so two concurrent approvals cannot both observe the
        // same starting status.
        let existing: Request = requests::table
            .find(request_id)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found("request not found"))?;

        let edits_fields = payload.request_date.is_some()
            || !payload.previous_start.is_omitted()
            || !payload.previous_end.is_omitted()
            || payload.start_at.is_some()
            || payload.end_at.is_some()
            || !payload.comment.is_omitted();

        let is_owner = existing.employee_id == user.account.employee_id;
        if edits_fields
            && !is_owner
            && !user.has_profile(&[Profile::Administrator, Profile::Supervisor])
        {
            return Err(AppError::forbidden(
                "you are not allowed to modify this request",
            ));
        }

        if let Some(request_date) = payload.request_date {
            validation::validate_request_date(request_date)?;
        }

        let start_at = payload.start_at.unwrap_or(existing.start_at);
        let end_at = payload.end_at.unwrap_or(existing.end_at);
        if payload.start_at.is_some() || payload.end_at.is_some() {
            validation::validate_working_hours(start_at, end_at)?;
        }

        // Null clears a side of the previous pair; the merged result must
        // still be both-or-neither.
        let previous_start = payload.previous_start.resolve(existing.previous_start);
        let previous_end = payload.previous_end.resolve(existing.previous_end);
        if !payload.previous_start.is_omitted() || !payload.previous_end.is_omitted() {
            validate_previous_pair(previous_start, previous_end)?;
        }

        let mut status = existing.status.clone();
        let mut validated_n1_at = existing.validated_n1_at;
        let mut validated_n2_at = existing.validated_n2_at;

        if let Some(next) = payload.status {
            let current = RequestStatus::parse(&existing.status)
                .ok_or_else(|| AppError::internal(format!("corrupt status {}", existing.status)))?;

            if next != current {
                crate::lifecycle::check_transition(current, next)?;

                let acting_employee = user.account.employee_id;
                let is_administrator = user.has_profile(&[Profile::Administrator]);
                let now = Utc::now().naive_utc();

                match next {
                    RequestStatus::FirstLevelApproved => {
                        approvals::resolve_pending_step(
                            conn,
                            request_id,
                            acting_employee,
                            true,
                            is_administrator,
                        )?;
                        validated_n1_at = Some(now);
                    }
                    RequestStatus::SecondLevelApproved => {
                        approvals::resolve_pending_step(
                            conn,
                            request_id,
                            acting_employee,
                            true,
                            is_administrator,
                        )?;
                        validated_n2_at = Some(now);
                    }
                    RequestStatus::Rejected => {
                        let has_pending_step: bool = diesel::select(exists(
                            workflows::table
                                .filter(workflows::request_id.eq(request_id))
                                .filter(workflows::status.eq(crate::lifecycle::STEP_PENDING)),
                        ))
                        .get_result(conn)?;

                        if has_pending_step {
                            approvals::resolve_pending_step(
                                conn,
                                request_id,
                                acting_employee,
                                false,
                                is_administrator,
                            )?;
                        } else {
                            user.require_profile(&[
                                Profile::Administrator,
                                Profile::Supervisor,
                            ])?;
                        }
                    }
                    // Submitted, InProgress and Accepted are requester-side
                    // moves along the chain.
                    _ => {
                        if !is_owner
                            && !user
                                .has_profile(&[Profile::Administrator, Profile::Supervisor])
                        {
                            return Err(AppError::forbidden(
                                "you are not allowed to modify this request",
                            ));
                        }
                    }
                }

                status = next.as_str().to_string();
            }
        }

        let updated = diesel::update(requests::table.find(request_id))
            .set((
                requests::request_date
                    .eq(payload.request_date.unwrap_or(existing.request_date)),
                requests::previous_start.eq(previous_start),
                requests::previous_end.eq(previous_end),
                requests::start_at.eq(start_at),
                requests::end_at.eq(end_at),
                requests::status.eq(status),
                requests::comment.eq(payload.comment.resolve(existing.comment)),
                requests::validated_n1_at.eq(validated_n1_at),
                requests::validated_n2_at.eq(validated_n2_at),
            ))
            .get_result(conn)?;

        Ok(updated)
    })?;

    Ok(Json(request_to_read(request)))
}

pub async fn delete_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        let existing: Request = requests::table
            .find(request_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found("request not found"))?;

        let is_owner = existing.employee_id == user.account.employee_id;
        if !is_owner && !user.has_profile(&[Profile::Administrator, Profile::Supervisor]) {
            return Err(AppError::forbidden(
                "you are not allowed to delete this request",
            ));
        }

        let has_workflows: bool = diesel::select(exists(
            workflows::table.filter(workflows::request_id.eq(request_id)),
        ))
        .get_result(conn)?;
        if has_workflows {
            return Err(AppError::bad_request(
                "request already has workflow steps and cannot be deleted",
            ));
        }

        diesel::delete(
            request_employees::table.filter(request_employees::request_id.eq(request_id)),
        )
        .execute(conn)?;
        diesel::delete(requests::table.find(request_id)).execute(conn)?;
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_request_employees(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<Vec<RequestEmployeeRead>>> {
    let mut conn = state.db()?;

    requests::table
        .find(request_id)
        .first::<Request>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("request not found"))?;

    let rows: Vec<RequestEmployee> = request_employees::table
        .filter(request_employees::request_id.eq(request_id))
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(link_to_read).collect()))
}

/// Attaches another employee to a request, sharing the same overtime
/// window. The hour total is derived from the request's time range.
pub async fn attach_request_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<AttachEmployeeRequest>,
) -> AppResult<Json<RequestEmployeeRead>> {
    let mut conn = state.db()?;
    let link = conn.transaction::<RequestEmployee, AppError, _>(|conn| {
        let request: Request = requests::table
            .find(request_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found("request not found"))?;

        let is_owner = request.employee_id == user.account.employee_id;
        if !is_owner && !user.has_profile(&[Profile::Administrator, Profile::Supervisor]) {
            return Err(AppError::forbidden(
                "you are not allowed to modify this request",
            ));
        }

        find_employee(conn, payload.employee_id)?
            .ok_or_else(|| AppError::bad_request("the specified employee does not exist"))?;

        let already_linked: bool = diesel::select(exists(
            request_employees::table
                .filter(request_employees::request_id.eq(request_id))
                .filter(request_employees::employee_id.eq(payload.employee_id)),
        ))
        .get_result(conn)?;
        if already_linked {
            return Err(AppError::conflict(
                "this employee is already attached to the request",
            ));
        }

        let total_hours = (request.end_at - request.start_at).num_minutes() as f64 / 60.0;
        let new_link = NewRequestEmployee {
            id: Uuid::new_v4(),
            request_id,
            employee_id: payload.employee_id,
            total_hours,
        };

        diesel::insert_into(request_employees::table)
            .values(&new_link)
            .execute(conn)?;

        Ok(request_employees::table.find(new_link.id).first(conn)?)
    })?;

    Ok(Json(link_to_read(link)))
}
