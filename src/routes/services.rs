use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::{dsl::exists, prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    error::{AppError, AppResult},
    models::{NewService, Profile, Service},
    schema::{employees, services},
    state::AppState,
    utils::json::Patch,
    validation,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    pub service_code: String,
    pub service_name: String,
    #[serde(default, rename = "parentServiceID")]
    pub parent_service_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    #[serde(default)]
    pub service_code: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default, rename = "parentServiceID")]
    pub parent_service_id: Patch<Uuid>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub manager: Patch<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRead {
    #[serde(rename = "serviceID")]
    pub service_id: Uuid,
    pub service_code: String,
    pub service_name: String,
    #[serde(rename = "parentServiceID")]
    pub parent_service_id: Option<Uuid>,
    pub description: Option<String>,
    pub manager: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

pub(super) fn service_to_read(service: Service) -> ServiceRead {
    ServiceRead {
        service_id: service.id,
        service_code: service.service_code,
        service_name: service.service_name,
        parent_service_id: service.parent_service_id,
        description: service.description,
        manager: service.manager,
        created_at: service.created_at,
        updated_at: service.updated_at,
    }
}

pub async fn list_services(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<ServiceRead>>> {
    let mut conn = state.db()?;
    let rows: Vec<Service> = services::table
        .order(services::service_code.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(service_to_read).collect()))
}

pub async fn get_service(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(service_id): Path<Uuid>,
) -> AppResult<Json<ServiceRead>> {
    let mut conn = state.db()?;
    let service: Service = services::table
        .find(service_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("service not found"))?;
    Ok(Json(service_to_read(service)))
}

pub async fn create_service(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateServiceRequest>,
) -> AppResult<Json<ServiceRead>> {
    user.require_profile(&[Profile::Administrator, Profile::Supervisor])?;
    validation::validate_service_code_format(&payload.service_code)?;

    let mut conn = state.db()?;
    let service = conn.transaction::<Service, AppError, _>(|conn| {
        let duplicate: Option<Service> = services::table
            .filter(services::service_code.eq(&payload.service_code))
            .first(conn)
            .optional()?;
        if duplicate.is_some() {
            return Err(AppError::conflict("a service with this code already exists"));
        }

        if let Some(parent_id) = payload.parent_service_id {
            services::table
                .find(parent_id)
                .first::<Service>(conn)
                .optional()?
                .ok_or_else(|| AppError::bad_request("parent service does not exist"))?;
        }

        let new_service = NewService {
            id: Uuid::new_v4(),
            service_code: payload.service_code,
            service_name: payload.service_name,
            parent_service_id: payload.parent_service_id,
            description: payload.description,
            manager: payload.manager,
        };

        diesel::insert_into(services::table)
            .values(&new_service)
            .execute(conn)?;

        Ok(services::table.find(new_service.id).first(conn)?)
    })?;

    Ok(Json(service_to_read(service)))
}

pub async fn update_service(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(service_id): Path<Uuid>,
    Json(payload): Json<UpdateServiceRequest>,
) -> AppResult<Json<ServiceRead>> {
    user.require_profile(&[Profile::Administrator, Profile::Supervisor])?;

    let mut conn = state.db()?;
    let service = conn.transaction::<Service, AppError, _>(|conn| {
        let existing: Service = services::table
            .find(service_id)
            .first(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found("service not found"))?;

        let service_code = match payload.service_code {
            Some(code) => {
                validation::validate_service_code_format(&code)?;
                if code != existing.service_code {
                    let duplicate: Option<Service> = services::table
                        .filter(services::service_code.eq(&code))
                        .filter(services::id.ne(service_id))
                        .first(conn)
                        .optional()?;
                    if duplicate.is_some() {
                        return Err(AppError::conflict(
                            "a service with this code already exists",
                        ));
                    }
                }
                code
            }
            None => existing.service_code,
        };

        let parent_service_id = match payload.parent_service_id {
            Patch::Omitted => existing.parent_service_id,
            Patch::Null => None,
            Patch::Value(parent_id) => {
                if parent_id == service_id {
                    return Err(AppError::bad_request(
                        "service cannot be its own parent",
                    ));
                }
                services::table
                    .find(parent_id)
                    .first::<Service>(conn)
                    .optional()?
                    .ok_or_else(|| AppError::bad_request("parent service does not exist"))?;
                ensure_no_parent_cycle(conn, service_id, parent_id)?;
                Some(parent_id)
            }
        };

        let service_name = payload.service_name.unwrap_or(existing.service_name);
        let description = payload.description.resolve(existing.description);
        let manager = payload.manager.resolve(existing.manager);

        let updated = diesel::update(services::table.find(service_id))
            .set((
                services::service_code.eq(service_code),
                services::service_name.eq(service_name),
                services::parent_service_id.eq(parent_service_id),
                services::description.eq(description),
                services::manager.eq(manager),
            ))
            .get_result(conn)?;

        Ok(updated)
    })?;

    Ok(Json(service_to_read(service)))
}

pub async fn delete_service(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(service_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_profile(&[Profile::Administrator])?;

    let mut conn = state.db()?;
    conn.transaction::<_, AppError, _>(|conn| {
        services::table
            .find(service_id)
            .first::<Service>(conn)
            .optional()?
            .ok_or_else(|| AppError::not_found("service not found"))?;

        let has_employees: bool = diesel::select(exists(
            employees::table.filter(employees::service_id.eq(service_id)),
        ))
        .get_result(conn)?;
        if has_employees {
            return Err(AppError::bad_request(
                "service still has employees assigned to it",
            ));
        }

        let has_children: bool = diesel::select(exists(
            services::table.filter(services::parent_service_id.eq(Some(service_id))),
        ))
        .get_result(conn)?;
        if has_children {
            return Err(AppError::bad_request("service still has child services"));
        }

        diesel::delete(services::table.find(service_id)).execute(conn)?;
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Walks up from `start_parent`; if `service_id` reappears among the
/// ancestors the new parent would close a cycle in the service tree.
fn ensure_no_parent_cycle(
    conn: &mut PgConnection,
    service_id: Uuid,
    start_parent: Uuid,
) -> AppResult<()> {
    let mut current = Some(start_parent);
    while let Some(ancestor_id) = current {
        if ancestor_id == service_id {
            return Err(AppError::bad_request(
                "service parent would create a cycle",
            ));
        }
        current = services::table
            .find(ancestor_id)
            .select(services::parent_service_id)
            .first::<Option<Uuid>>(conn)?;
    }
    Ok(())
}
