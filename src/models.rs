use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;

/// Authorization profile carried by an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    Validator,
    Supervisor,
    Administrator,
    Coordinator,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Validator => "Validator",
            Profile::Supervisor => "Supervisor",
            Profile::Administrator => "Administrator",
            Profile::Coordinator => "Coordinator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Validator" => Some(Profile::Validator),
            "Supervisor" => Some(Profile::Supervisor),
            "Administrator" => Some(Profile::Administrator),
            "Coordinator" => Some(Profile::Coordinator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(rename = "CDI")]
    Cdi,
    #[serde(rename = "CDD")]
    Cdd,
    Interim,
    Stage,
    Alternance,
    #[serde(rename = "MOO")]
    Moo,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Cdi => "CDI",
            ContractType::Cdd => "CDD",
            ContractType::Interim => "Interim",
            ContractType::Stage => "Stage",
            ContractType::Alternance => "Alternance",
            ContractType::Moo => "MOO",
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = services)]
pub struct Service {
    pub id: Uuid,
    pub service_code: String,
    pub service_name: String,
    pub parent_service_id: Option<Uuid>,
    pub description: Option<String>,
    pub manager: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = services)]
pub struct NewService {
    pub id: Uuid,
    pub service_code: String,
    pub service_name: String,
    pub parent_service_id: Option<Uuid>,
    pub description: Option<String>,
    pub manager: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = employees)]
#[diesel(belongs_to(Service, foreign_key = service_id))]
pub struct Employee {
    pub id: Uuid,
    pub employee_number: String,
    pub last_name: String,
    pub first_name: String,
    pub service_id: Uuid,
    pub contract_type: String,
    pub contact: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = employees)]
pub struct NewEmployee {
    pub id: Uuid,
    pub employee_number: String,
    pub last_name: String,
    pub first_name: String,
    pub service_id: Uuid,
    pub contract_type: String,
    pub contact: Option<String>,
    pub birthdate: Option<NaiveDate>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = accounts)]
#[diesel(belongs_to(Employee, foreign_key = employee_id))]
pub struct Account {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub profile: String,
    pub is_active: bool,
    pub last_login: Option<NaiveDateTime>,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccount {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub profile: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = requests)]
#[diesel(belongs_to(Employee, foreign_key = employee_id))]
pub struct Request {
    pub id: Uuid,
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

#[derive(Debug, Insertable)]
#[diesel(table_name = requests)]
pub struct NewRequest {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub request_date: NaiveDate,
    pub previous_start: Option<NaiveTime>,
    pub previous_end: Option<NaiveTime>,
    pub start_at: NaiveTime,
    pub end_at: NaiveTime,
    pub status: String,
    pub comment: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Join row modelling a group overtime claim shared with extra employees.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = request_employees)]
#[diesel(belongs_to(Request, foreign_key = request_id))]
pub struct RequestEmployee {
    pub id: Uuid,
    pub request_id: Uuid,
    pub employee_id: Uuid,
    pub total_hours: f64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = request_employees)]
pub struct NewRequestEmployee {
    pub id: Uuid,
    pub request_id: Uuid,
    pub employee_id: Uuid,
    pub total_hours: f64,
}

/// Time-bounded transfer of approval authority between two employees.
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = delegations)]
pub struct Delegation {
    pub id: Uuid,
    pub delegated_by: Uuid,
    pub delegated_to: Uuid,
    pub start_at: NaiveDate,
    pub end_at: NaiveDate,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = delegations)]
pub struct NewDelegation {
    pub id: Uuid,
    pub delegated_by: Uuid,
    pub delegated_to: Uuid,
    pub start_at: NaiveDate,
    pub end_at: NaiveDate,
}

/// One validator assignment for a request at a given approval level.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = workflows)]
#[diesel(belongs_to(Request, foreign_key = request_id))]
pub struct Workflow {
    pub id: Uuid,
    pub request_id: Uuid,
    pub validator_id: Uuid,
    pub delegate_id: Option<Uuid>,
    pub assign_date: NaiveDateTime,
    pub validation_date: Option<NaiveDateTime>,
    pub status: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = workflows)]
pub struct NewWorkflow {
    pub id: Uuid,
    pub request_id: Uuid,
    pub validator_id: Uuid,
    pub delegate_id: Option<Uuid>,
    pub assign_date: NaiveDateTime,
    pub status: i32,
}
