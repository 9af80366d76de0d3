use axum::{extract::State, Json};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    approvals,
    auth::CurrentUser,
    error::{AppError, AppResult},
    lifecycle::{STEP_APPROVED, STEP_PENDING, STEP_REJECTED},
    models::{NewWorkflow, Profile, Request, Workflow},
    schema::{requests, workflows},
    state::AppState,
    validation,
};

use super::employees::find_employee;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    #[serde(rename = "requestID")]
    pub request_id: Uuid,
    pub validator: Uuid,
    pub assign_date: NaiveDateTime,
    #[serde(default)]
    pub status: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRead {
    #[serde(rename = "workflowID")]
    pub workflow_id: Uuid,
    #[serde(rename = "requestID")]
    pub request_id: Uuid,
    pub validator: Uuid,
    pub delegate: Option<Uuid>,
    pub assign_date: NaiveDateTime,
    pub validation_date: Option<NaiveDateTime>,
    pub status: i32,
}

fn workflow_to_read(workflow: Workflow) -> WorkflowRead {
    WorkflowRead {
        workflow_id: workflow.id,
        request_id: workflow.request_id,
        validator: workflow.validator_id,
        delegate: workflow.delegate_id,
        assign_date: workflow.assign_date,
        validation_date: workflow.validation_date,
        status: workflow.status,
    }
}

pub async fn list_workflows(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<WorkflowRead>>> {
    user.require_profile(&[Profile::Administrator, Profile::Supervisor])?;

    let mut conn = state.db()?;
    let rows: Vec<Workflow> = workflows::table
        .order(workflows::assign_date.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(workflow_to_read).collect()))
}

pub async fn create_workflow(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateWorkflowRequest>,
) -> AppResult<Json<WorkflowRead>> {
    user.require_profile(&[Profile::Administrator, Profile::Supervisor])?;

    let status = payload.status.unwrap_or(STEP_PENDING);
    if !matches!(status, STEP_PENDING | STEP_APPROVED | STEP_REJECTED) {
        return Err(AppError::bad_request("invalid workflow step status"));
    }

    let mut conn = state.db()?;
    let workflow = conn.transaction::<Workflow, AppError, _>(|conn| {
        requests::table
            .find(payload.request_id)
            .first::<Request>(conn)
            .optional()?
            .ok_or_else(|| AppError::bad_request("the specified request does not exist"))?;

        find_employee(conn, payload.validator)?
            .ok_or_else(|| AppError::bad_request("the specified validator does not exist"))?;

        // If the validator's authority is delegated right now, record the
        // delegate on the step at assignment time.
        let approver = approvals::effective_approver(conn, payload.validator, validation::today())?;
        let delegate_id = (approver != payload.validator).then_some(approver);

        let new_workflow = NewWorkflow {
            id: Uuid::new_v4(),
            request_id: payload.request_id,
            validator_id: payload.validator,
            delegate_id,
            assign_date: payload.assign_date,
            status,
        };

        diesel::insert_into(workflows::table)
            .values(&new_workflow)
            .execute(conn)?;

        Ok(workflows::table.find(new_workflow.id).first(conn)?)
    })?;

    Ok(Json(workflow_to_read(workflow)))
}
