use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::{dsl::exists, prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::{AppError, AppResult},
    models::{ContractType, Employee, NewEmployee, Profile, Service},
    schema::{accounts, delegations, employees, request_employees, requests, services, workflows},
    state::AppState,
    utils::json::Patch,
    validation,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeRequest {
    pub employee_number: String,
    pub last_name: String,
    pub first_name: String,
    #[serde(rename = "serviceID")]
    pub service_id: Uuid,
    #[serde(default)]
    pub contract_type: Option<ContractType>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeeRequest {
    #[serde(default)]
    pub employee_number: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default, rename = "serviceID")]
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub contract_type: Option<ContractType>,
    #[serde(default)]
    pub contact: Patch<String>,
    #[serde(default)]
    pub birthdate: Patch<NaiveDate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRead {
    #[serde(rename = "employeeID")]
    pub employee_id: Uuid,
    pub employee_number: String,
    pub last_name: String,
    pub first_name: String,
    #[serde(rename = "serviceID")]
    pub service_id: Uuid,
    pub contract_type: String,
    pub contact: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub(super) fn employee_to_read(employee: Employee) -> EmployeeRead {
    EmployeeRead {
        employee_id: employee.id,
        employee_number: employee.employee_number,
        last_name: employee.last_name,
        first_name: employee.first_name,
        service_id: employee.service_id,
        contract_type: employee.contract_type,
        contact: employee.contact,
        birthdate: employee.birthdate,
        created_at: employee.created_at,
        updated_at: employee.updated_at,
    }
}

pub(super) fn find_employee(
    conn: &mut PgConnection,
    employee_id: Uuid,
) -> AppResult<Option<Employee>> {
    Ok(employees::table.find(employee_id).first(conn).optional()?)
}

pub async fn list_employees(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<EmployeeRead>>> {
    let mut conn = state.db()?;
    let rows: Vec<Employee> = employees::table
        .order(employees::employee_number.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(employee_to_read).collect()))
}

pub async fn get_employee(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(employee_id): Path<Uuid>,
) -> AppResult<Json<EmployeeRead>> {
    let mut conn = state.db()?;
    let employee = find_employee(&mut conn, employee_id)?
        .ok_or_else(|| AppError::not_found("employee not found"))?;
    Ok(Json(employee_to_read(employee)))
}

pub async fn create_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateEmployeeRequest>,
) -> AppResult<Json<EmployeeRead>> {
    user.require_profile(&[Profile::Administrator, Profile::Supervisor])?;
    validation::validate_employee_number_format(&payload.employee_number)?;

    let mut conn = state.db()?;
    let employee = conn.transaction::<Employee, AppError, _>(|conn| {
        let duplicate: Option<Employee> = employees::table
            .filter(employees::employee_number.eq(&payload.employee_number))
            .first(conn)
            .optional()?;
        if duplicate.is_some() {
            return Err(AppError::conflict(
                "an employee with this number already exists",
            ));
        }

        services::table
            .find(payload.service_id)
            .first::<Service>(conn)
            .optional()?
            .ok_or_else(|| AppError::bad_request("the specified service does not exist"))?;

        let new_employee = NewEmployee {
            id: Uuid::new_v4(),
            employee_number: payload.employee_number,
            last_name: payload.last_name,
            first_name: payload.first_name,
            service_id: payload.service_id,
            contract_type: payload
                .contract_type
                .unwrap_or(ContractType::Cdi)
                .as_str()
                .to_string(),
            contact: payload.contact,
            birthdate: payload.birthdate,
        };

        diesel::insert_into(employees::table)
            .values(&new_employee)
            .execute(conn)?;

        Ok(employees::table.find(new_employee.id).first(conn)?)
    })?;

    Ok(Json(employee_to_read(employee)))
}

pub async fn update_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(employee_id): Path<Uuid>,
    Json(payload): Json<UpdateEmployeeRequest>,
) -> AppResult<Json<EmployeeRead>> {
    user.require_profile(&[Profile::Administrator, Profile::Supervisor])?;

    let mut conn = state.db()?;
    let employee = conn.transaction::<Employee, AppError, _>(|conn| {
        let existing = find_employee(conn, employee_id)?
            .ok_or_else(|| AppError::not_found("employee not found"))?;

        let employee_number = match payload.employee_number {
            Some(number) => {
                validation::validate_employee_number_format(&number)?;
                if number != existing.employee_number {
                    let duplicate: Option<Employee> = employees::table
                        .filter(employees::employee_number.eq(&number))
                        .filter(employees::id.ne(employee_id))
                        .first(conn)
                        .optional()?;
                    if duplicate.is_some() {
                        return Err(AppError::conflict(
                            "an employee with this number already exists",
                        ));
                    }
                }
                number
            }
            None => existing.employee_number,
        };

        let service_id = match payload.service_id {
            Some(service_id) => {
                services::table
                    .find(service_id)
                    .first::<Service>(conn)
                    .optional()?
                    .ok_or_else(|| AppError::bad_request("the specified service does not exist"))?;
                service_id
            }
            None => existing.service_id,
        };

        let contract_type = payload
            .contract_type
            .map(|contract| contract.as_str().to_string())
            .unwrap_or(existing.contract_type);

        let updated = diesel::update(employees::table.find(employee_id))
            .set((
                employees::employee_number.eq(employee_number),
                employees::last_name.eq(payload.last_name.unwrap_or(existing.last_name)),
                employees::first_name.eq(payload.first_name.unwrap_or(existing.first_name)),
                employees::service_id.eq(service_id),
                employees::contract_type.eq(contract_type),
                employees::contact.eq(payload.contact.resolve(existing.contact)),
                employees::birthdate.eq(payload.birthdate.resolve(existing.birthdate)),
            ))
            .get_result(conn)?;

        Ok(updated)
    })?;

    Ok(Json(employee_to_read(employee)))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(employee_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_profile(&[Profile::Administrator])?;

    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        find_employee(conn, employee_id)?
            .ok_or_else(|| AppError::not_found("employee not found"))?;

        // Deletion is restricted, never cascaded: an employee wired into
        // accounts, requests, delegations or workflow steps stays.
        let referenced: bool = diesel::select(
            exists(accounts::table.filter(accounts::employee_id.eq(employee_id)))
                .or(exists(requests::table.filter(
                    requests::employee_id
                        .eq(employee_id)
                        .or(requests::created_by.eq(Some(employee_id))),
                )))
                .or(exists(delegations::table.filter(
                    delegations::delegated_by
                        .eq(employee_id)
                        .or(delegations::delegated_to.eq(employee_id)),
                )))
                .or(exists(workflows::table.filter(
                    workflows::validator_id
                        .eq(employee_id)
                        .or(workflows::delegate_id.eq(Some(employee_id))),
                )))
                .or(exists(
                    request_employees::table
                        .filter(request_employees::employee_id.eq(employee_id)),
                )),
        )
        .get_result(conn)?;

        if referenced {
            return Err(AppError::bad_request(
                "employee is still referenced by accounts, requests, delegations or workflows",
            ));
        }

        diesel::delete(employees::table.find(employee_id)).execute(conn)?;
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}
