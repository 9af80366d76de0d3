mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{acquire_db_lock, body_to_json, TestApp};
use serde_json::json;
use uuid::Uuid;

struct Fixture {
    service_id: Uuid,
    owner_id: Uuid,
    owner_token: String,
    admin_token: String,
}

async fn setup(app: &TestApp) -> Result<Fixture> {
    let service_id = app.insert_service("IT001", "Service Informatique").await?;

    let admin_id = app.insert_employee("EMP000", service_id).await?;
    app.insert_account(admin_id, "admin", "admin123", "Administrator")
        .await?;
    let admin_token = app.login_token("admin", "admin123").await?;

    let owner_id = app.insert_employee("EMP001", service_id).await?;
    app.insert_account(owner_id, "alice", "alicepass", "Validator")
        .await?;
    let owner_token = app.login_token("alice", "alicepass").await?;

    Ok(Fixture {
        service_id,
        owner_id,
        owner_token,
        admin_token,
    })
}

async fn create_request(app: &TestApp, token: &str, employee_id: Uuid) -> Result<Uuid> {
    let today = Utc::now().date_naive();
    let response = app
        .post_json(
            "/requests/",
            &json!({
                "employeeID": employee_id,
                "requestDate": today,
                "startAt": "18:00:00",
                "endAt": "20:30:00",
            }),
            Some(token),
        )
        .await?;
    anyhow::ensure!(
        response.status() == StatusCode::OK,
        "request creation failed with status {}",
        response.status()
    );
    let body = body_to_json(response.into_body()).await?;
    Ok(body["requestID"].as_str().unwrap().parse()?)
}

#[tokio::test]
async fn creation_validates_date_and_hours() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;
    let today = Utc::now().date_naive();

    // Yesterday is refused.
    let response = app
        .post_json(
            "/requests/",
            &json!({
                "employeeID": fixture.owner_id,
                "requestDate": today - Duration::days(1),
                "startAt": "18:00:00",
                "endAt": "20:00:00",
            }),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // More than twelve hours is refused.
    let response = app
        .post_json(
            "/requests/",
            &json!({
                "employeeID": fixture.owner_id,
                "requestDate": today,
                "startAt": "08:00:00",
                "endAt": "20:30:00",
            }),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Exactly twelve hours is the inclusive maximum.
    let response = app
        .post_json(
            "/requests/",
            &json!({
                "employeeID": fixture.owner_id,
                "requestDate": today,
                "startAt": "08:00:00",
                "endAt": "20:00:00",
            }),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_to_json(response.into_body()).await?;
    assert_eq!(created["status"], "pending");

    // previousStart without previousEnd is incoherent.
    let response = app
        .post_json(
            "/requests/",
            &json!({
                "employeeID": fixture.owner_id,
                "requestDate": today,
                "previousStart": "08:00:00",
                "startAt": "18:00:00",
                "endAt": "20:00:00",
            }),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn optional_fields_are_cleared_by_explicit_null_only() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;
    let today = Utc::now().date_naive();

    let response = app
        .post_json(
            "/requests/",
            &json!({
                "employeeID": fixture.owner_id,
                "requestDate": today,
                "previousStart": "08:00:00",
                "previousEnd": "16:00:00",
                "startAt": "18:00:00",
                "endAt": "20:00:00",
                "comment": "machine room move",
            }),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_to_json(response.into_body()).await?;
    let request_id = created["requestID"].as_str().unwrap().to_string();

    // Omitting the keys keeps comment and previous schedule intact.
    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"endAt": "21:00:00"}),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_to_json(response.into_body()).await?;
    assert_eq!(updated["comment"], "machine room move");
    assert_eq!(updated["previousStart"], "08:00:00");

    // Clearing one side of the previous pair breaks the both-or-neither
    // rule.
    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"previousStart": null}),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Clearing both sides, and the comment, sticks.
    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"previousStart": null, "previousEnd": null, "comment": null}),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_to_json(response.into_body()).await?;
    assert!(updated["previousStart"].is_null());
    assert!(updated["previousEnd"].is_null());
    assert!(updated["comment"].is_null());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn the_filer_is_always_the_caller() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;

    let bob_id = app.insert_employee("EMP002", fixture.service_id).await?;

    // Alice files on Bob's behalf: createdBy still records Alice.
    let today = Utc::now().date_naive();
    let response = app
        .post_json(
            "/requests/",
            &json!({
                "employeeID": bob_id,
                "requestDate": today,
                "startAt": "18:00:00",
                "endAt": "20:00:00",
            }),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_to_json(response.into_body()).await?;
    assert_eq!(
        created["createdBy"].as_str().unwrap(),
        fixture.owner_id.to_string()
    );

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn full_approval_walk_to_accepted() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;

    let victor_id = app.insert_employee("EMP010", fixture.service_id).await?;
    app.insert_account(victor_id, "victor", "victorpass", "Validator")
        .await?;
    let victor_token = app.login_token("victor", "victorpass").await?;

    let nadia_id = app.insert_employee("EMP011", fixture.service_id).await?;
    app.insert_account(nadia_id, "nadia", "nadiapass", "Validator")
        .await?;
    let nadia_token = app.login_token("nadia", "nadiapass").await?;

    let request_id = create_request(&app, &fixture.owner_token, fixture.owner_id).await?;

    let now = Utc::now().naive_utc();
    app.insert_workflow(request_id, victor_id, now).await?;
    app.insert_workflow(request_id, nadia_id, now + Duration::seconds(1))
        .await?;

    let put_status = |token: String, status: &'static str| {
        let app = &app;
        async move {
            app.put_json(
                &format!("/requests/{request_id}"),
                &json!({"status": status}),
                Some(&token),
            )
            .await
        }
    };

    let response = put_status(fixture.owner_token.clone(), "submitted").await?;
    assert_eq!(response.status(), StatusCode::OK);

    // A bystander validator cannot take the first approval step.
    let response = put_status(nadia_token.clone(), "firstLevelApproved").await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = put_status(victor_token.clone(), "firstLevelApproved").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "firstLevelApproved");
    assert!(!body["validatedN1At"].is_null());
    assert!(body["validatedN2At"].is_null());

    let response = put_status(fixture.owner_token.clone(), "inProgress").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = put_status(nadia_token.clone(), "secondLevelApproved").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert!(!body["validatedN2At"].is_null());

    let response = put_status(fixture.owner_token.clone(), "accepted").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "accepted");

    // Both steps were consumed in assignment order.
    let response = app.get("/workflows/", Some(&fixture.admin_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let steps = body_to_json(response.into_body()).await?;
    let steps = steps.as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|step| step["status"] == 1));
    assert!(steps.iter().all(|step| !step["validationDate"].is_null()));

    // Accepted is terminal.
    let response = put_status(fixture.owner_token.clone(), "rejected").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn transitions_cannot_skip_steps() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;

    let request_id = create_request(&app, &fixture.owner_token, fixture.owner_id).await?;

    for status in ["accepted", "firstLevelApproved", "inProgress"] {
        let response = app
            .put_json(
                &format!("/requests/{request_id}"),
                &json!({"status": status}),
                Some(&fixture.owner_token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "status {status}");
    }

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn rejection_without_a_pending_step_needs_elevation() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;

    let request_id = create_request(&app, &fixture.owner_token, fixture.owner_id).await?;

    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"status": "submitted"}),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // No workflow step exists, so the owner alone cannot reject.
    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"status": "rejected"}),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"status": "rejected"}),
            Some(&fixture.admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response.into_body()).await?;
    assert_eq!(body["status"], "rejected");

    // Rejected is terminal too.
    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"status": "submitted"}),
            Some(&fixture.admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn a_delegate_can_approve_and_is_recorded() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;

    let victor_id = app.insert_employee("EMP010", fixture.service_id).await?;
    let diana_id = app.insert_employee("EMP012", fixture.service_id).await?;
    app.insert_account(diana_id, "diana", "dianapass", "Validator")
        .await?;
    let diana_token = app.login_token("diana", "dianapass").await?;

    let today = Utc::now().date_naive();
    let response = app
        .post_json(
            "/delegations/",
            &json!({
                "delegatedBy": victor_id,
                "delegatedTo": diana_id,
                "startAt": today,
                "endAt": today,
            }),
            Some(&fixture.admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let request_id = create_request(&app, &fixture.owner_token, fixture.owner_id).await?;
    app.insert_workflow(request_id, victor_id, Utc::now().naive_utc())
        .await?;

    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"status": "submitted"}),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Diana holds Victor's authority today.
    let response = app
        .put_json(
            &format!("/requests/{request_id}"),
            &json!({"status": "firstLevelApproved"}),
            Some(&diana_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/workflows/", Some(&fixture.admin_token)).await?;
    let steps = body_to_json(response.into_body()).await?;
    let step = &steps.as_array().unwrap()[0];
    assert_eq!(step["status"], 1);
    assert_eq!(step["validator"].as_str().unwrap(), victor_id.to_string());
    assert_eq!(step["delegate"].as_str().unwrap(), diana_id.to_string());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn attached_employees_share_the_overtime_window() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;

    let bob_id = app.insert_employee("EMP002", fixture.service_id).await?;
    let request_id = create_request(&app, &fixture.owner_token, fixture.owner_id).await?;

    let response = app
        .post_json(
            &format!("/requests/{request_id}/employees"),
            &json!({"employeeID": bob_id}),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let link = body_to_json(response.into_body()).await?;
    // 18:00 to 20:30 is two and a half hours.
    assert_eq!(link["totalHours"].as_f64().unwrap(), 2.5);

    let response = app
        .post_json(
            &format!("/requests/{request_id}/employees"),
            &json!({"employeeID": bob_id}),
            Some(&fixture.owner_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .get(&format!("/requests/{request_id}/employees"), Some(&fixture.owner_token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let links = body_to_json(response.into_body()).await?;
    assert_eq!(links.as_array().unwrap().len(), 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn deletion_rules() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let fixture = setup(&app).await?;

    let victor_id = app.insert_employee("EMP010", fixture.service_id).await?;

    // Another validator's request is off limits.
    let other_request = create_request(&app, &fixture.admin_token, victor_id).await?;
    let response = app
        .delete(&format!("/requests/{other_request}"), Some(&fixture.owner_token))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // A request with workflow steps cannot be deleted at all.
    let locked_request = create_request(&app, &fixture.owner_token, fixture.owner_id).await?;
    app.insert_workflow(locked_request, victor_id, Utc::now().naive_utc())
        .await?;
    let response = app
        .delete(&format!("/requests/{locked_request}"), Some(&fixture.admin_token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let free_request = create_request(&app, &fixture.owner_token, fixture.owner_id).await?;
    let response = app
        .delete(&format!("/requests/{free_request}"), Some(&fixture.owner_token))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/requests/{free_request}"), Some(&fixture.owner_token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
