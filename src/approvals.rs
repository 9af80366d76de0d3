//! Resolution of who may act on a workflow step. A validator's authority
//! can be delegated for a date range; while a delegation is active the
//! delegate acts in the validator's place and is recorded on the step.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::lifecycle::{STEP_APPROVED, STEP_PENDING, STEP_REJECTED};
use crate::models::{Delegation, Workflow};
use crate::schema::{delegations, workflows};
use crate::validation;

/// Who may currently approve in place of `validator_id`: the active
/// delegate if a delegation covers `on`, otherwise the validator.
pub fn effective_approver(
    conn: &mut PgConnection,
    validator_id: Uuid,
    on: NaiveDate,
) -> AppResult<Uuid> {
    let delegation: Option<Delegation> = delegations::table
        .filter(delegations::delegated_by.eq(validator_id))
        .filter(delegations::start_at.le(on))
        .filter(delegations::end_at.ge(on))
        .first(conn)
        .optional()?;

    Ok(delegation
        .map(|delegation| delegation.delegated_to)
        .unwrap_or(validator_id))
}

/// Resolves the oldest pending workflow step of a request as approved or
/// rejected. The acting employee must be the step's validator, the
/// validator's active delegate, or an administrator; acting through a
/// delegation is recorded on the step.
pub fn resolve_pending_step(
    conn: &mut PgConnection,
    request_id: Uuid,
    acting_employee: Uuid,
    approve: bool,
    is_administrator: bool,
) -> AppResult<Workflow> {
    let step: Option<Workflow> = workflows::table
        .filter(workflows::request_id.eq(request_id))
        .filter(workflows::status.eq(STEP_PENDING))
        .order(workflows::assign_date.asc())
        .first(conn)
        .optional()?;

    let Some(step) = step else {
        return Err(AppError::bad_request(
            "no pending workflow step for this request",
        ));
    };

    let approver = effective_approver(conn, step.validator_id, validation::today())?;
    let allowed =
        acting_employee == step.validator_id || acting_employee == approver || is_administrator;
    if !allowed {
        return Err(AppError::forbidden(
            "only the assigned validator or an active delegate may act on this step",
        ));
    }

    let acted_by_delegate = approver != step.validator_id && acting_employee == approver;
    let delegate_id = if acted_by_delegate {
        Some(approver)
    } else {
        step.delegate_id
    };
    let status = if approve { STEP_APPROVED } else { STEP_REJECTED };

    let step = diesel::update(workflows::table.find(step.id))
        .set((
            workflows::status.eq(status),
            workflows::validation_date.eq(Utc::now().naive_utc()),
            workflows::delegate_id.eq(delegate_id),
        ))
        .get_result(conn)?;

    Ok(step)
}
