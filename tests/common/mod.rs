use std::env;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use ghs_api::auth::jwt::JwtService;
use ghs_api::auth::password::hash_password;
use ghs_api::config::AppConfig;
use ghs_api::db::{self, PgPool};
use ghs_api::models::{NewAccount, NewEmployee, NewRequest, NewService, NewWorkflow};
use ghs_api::routes;
use ghs_api::state::AppState;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self { state, router })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    pub async fn insert_service(&self, code: &str, name: &str) -> Result<Uuid> {
        let code = code.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            let service = NewService {
                id: Uuid::new_v4(),
                service_code: code,
                service_name: name,
                parent_service_id: None,
                description: None,
                manager: None,
            };
            diesel::insert_into(ghs_api::schema::services::table)
                .values(&service)
                .execute(conn)
                .context("failed to insert service")?;
            Ok(service.id)
        })
        .await
    }

    pub async fn insert_employee(&self, number: &str, service_id: Uuid) -> Result<Uuid> {
        let number = number.to_string();
        self.with_conn(move |conn| {
            let employee = NewEmployee {
                id: Uuid::new_v4(),
                employee_number: number.clone(),
                last_name: "Doe".to_string(),
                first_name: number,
                service_id,
                contract_type: "CDI".to_string(),
                contact: None,
                birthdate: None,
            };
            diesel::insert_into(ghs_api::schema::employees::table)
                .values(&employee)
                .execute(conn)
                .context("failed to insert employee")?;
            Ok(employee.id)
        })
        .await
    }

    pub async fn insert_account(
        &self,
        employee_id: Uuid,
        username: &str,
        password: &str,
        profile: &str,
    ) -> Result<Uuid> {
        let username = username.to_string();
        let password = password.to_string();
        let profile = profile.to_string();
        self.with_conn(move |conn| {
            let account = NewAccount {
                id: Uuid::new_v4(),
                employee_id,
                username,
                password_hash: hash_password(&password)?,
                profile,
                is_active: true,
            };
            diesel::insert_into(ghs_api::schema::accounts::table)
                .values(&account)
                .execute(conn)
                .context("failed to insert account")?;
            Ok(account.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_request(
        &self,
        employee_id: Uuid,
        request_date: NaiveDate,
        start_at: NaiveTime,
        end_at: NaiveTime,
        status: &str,
    ) -> Result<Uuid> {
        let status = status.to_string();
        self.with_conn(move |conn| {
            let request = NewRequest {
                id: Uuid::new_v4(),
                employee_id,
                request_date,
                previous_start: None,
                previous_end: None,
                start_at,
                end_at,
                status,
                comment: None,
                created_by: Some(employee_id),
            };
            diesel::insert_into(ghs_api::schema::requests::table)
                .values(&request)
                .execute(conn)
                .context("failed to insert request")?;
            Ok(request.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_workflow(
        &self,
        request_id: Uuid,
        validator_id: Uuid,
        assign_date: NaiveDateTime,
    ) -> Result<Uuid> {
        self.with_conn(move |conn| {
            let workflow = NewWorkflow {
                id: Uuid::new_v4(),
                request_id,
                validator_id,
                delegate_id: None,
                assign_date,
                status: 0,
            };
            diesel::insert_into(ghs_api::schema::workflows::table)
                .values(&workflow)
                .execute(conn)
                .context("failed to insert workflow")?;
            Ok(workflow.id)
        })
        .await
    }

    pub async fn login_token(&self, username: &str, password: &str) -> Result<String> {
        let response = self.post_login(username, password).await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(parsed.access_token)
    }

    pub async fn post_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<hyper::Response<Body>> {
        let body = format!(
            "username={}&password={}",
            urlencode(username),
            urlencode(password)
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_to_json(body: Body) -> Result<serde_json::Value> {
    let bytes = body_to_vec(body).await?;
    serde_json::from_slice(&bytes).context("response body was not valid JSON")
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE workflows, delegations, request_employees, requests, accounts, employees, services RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
