//! Seeds the database with a demo organization: three services, a handful
//! of employees and one account per profile. Intended for local setups.

use chrono::NaiveDate;
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ghs_api::auth::password::hash_password;
use ghs_api::config::AppConfig;
use ghs_api::db;
use ghs_api::models::{NewAccount, NewEmployee, NewService, Profile};
use ghs_api::schema::{accounts, employees, services};

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get()?;

    let service_rows = [
        ("IT001", "Service Informatique", "Jean Dupont"),
        ("HR001", "Ressources Humaines", "Marie Martin"),
        ("FIN001", "Service Financier", "Pierre Durand"),
    ];

    let mut service_ids = Vec::new();
    for (code, name, manager) in service_rows {
        let service = NewService {
            id: Uuid::new_v4(),
            service_code: code.to_string(),
            service_name: name.to_string(),
            parent_service_id: None,
            description: None,
            manager: Some(manager.to_string()),
        };
        diesel::insert_into(services::table)
            .values(&service)
            .execute(&mut conn)?;
        tracing::info!(code, name, "created service");
        service_ids.push(service.id);
    }

    let employee_rows = [
        ("EMP001", "Admin", "Super", 0),
        ("EMP002", "Valideur", "Victor", 0),
        ("EMP003", "Superviseur", "Sophie", 1),
        ("EMP004", "Comptable", "Claire", 2),
    ];

    let mut employee_ids = Vec::new();
    for (number, last_name, first_name, service_index) in employee_rows {
        let employee = NewEmployee {
            id: Uuid::new_v4(),
            employee_number: number.to_string(),
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            service_id: service_ids[service_index],
            contract_type: "CDI".to_string(),
            contact: None,
            birthdate: NaiveDate::from_ymd_opt(1980, 1, 1),
        };
        diesel::insert_into(employees::table)
            .values(&employee)
            .execute(&mut conn)?;
        tracing::info!(number, "created employee");
        employee_ids.push(employee.id);
    }

    let account_rows = [
        ("admin", "admin123", Profile::Administrator, 0),
        ("validator", "validator123", Profile::Validator, 1),
        ("supervisor", "supervisor123", Profile::Supervisor, 2),
        ("coordinator", "coordinator123", Profile::Coordinator, 3),
    ];

    for (username, plain_password, profile, employee_index) in account_rows {
        let account = NewAccount {
            id: Uuid::new_v4(),
            employee_id: employee_ids[employee_index],
            username: username.to_string(),
            password_hash: hash_password(plain_password)?,
            profile: profile.as_str().to_string(),
            is_active: true,
        };
        diesel::insert_into(accounts::table)
            .values(&account)
            .execute(&mut conn)?;
        tracing::info!(username, profile = profile.as_str(), "created account");
    }

    tracing::info!("seed complete");
    Ok(())
}
