mod common;

use actix_web::{http::StatusCode, test};
use gearguard_api::app;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{send, signup, state};

fn without(mut request: Value, key: &str) -> Value {
    if let Some(fields) = request.as_object_mut() {
        fields.remove(key);
    }
    request
}

#[actix_web::test]
async fn test_new_request_starts_in_first_stage() {
    let app = test::init_service(app(state())).await;
    let ana = signup(&app, "Ana", "ana@x.com", "pw1").await;

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/equipment")
            .set_json(json!({ "name": "Hydraulic Press" })),
        &ana.token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, created) = send(
        &app,
        test::TestRequest::post().uri("/api/maintenance/requests").set_json(json!({
            "subject": "Oil leak",
            "description": "Leak under the main cylinder",
            "request_type": "corrective",
            "equipment_id": 1,
            "scheduled_date": "2024-03-01"
        })),
        &ana.token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Request created!");
    let id = created["id"].as_i64().unwrap();

    let (status, request) = send(
        &app,
        test::TestRequest::get().uri(&format!("/api/maintenance/requests/{id}")),
        &ana.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["stage_id"], 1);
    assert_eq!(request["stage_name"], "New Request");
    assert_eq!(request["type"], "corrective");
    assert_eq!(request["priority"], "low");
    assert_eq!(request["kanban_state"], "normal");
    assert_eq!(request["equipment_name"], "Hydraulic Press");
    assert_eq!(request["technician_name"], "Unassigned");
    assert_eq!(request["created_by"], ana.user.id);
    assert_eq!(request["scheduled_date"], "2024-03-01T00:00:00Z");

    let (_, listed) = send(
        &app,
        test::TestRequest::get().uri("/api/maintenance/requests"),
        &ana.token,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0], request);
}

#[actix_web::test]
async fn test_priority_update_leaves_other_fields_alone() {
    let app = test::init_service(app(state())).await;
    let ana = signup(&app, "Ana", "ana@x.com", "pw1").await;
    let tec = signup(&app, "Tec", "tec@x.com", "pw2").await;

    let (status, created) = send(
        &app,
        test::TestRequest::post().uri("/api/maintenance/requests").set_json(json!({
            "subject": "Quarterly inspection",
            "request_type": "preventive",
            "technician_user_id": tec.user.id,
            "priority": "medium"
        })),
        &ana.token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/maintenance/requests/{}", created["id"]);

    let (_, before) = send(&app, test::TestRequest::get().uri(&uri), &ana.token).await;
    assert_eq!(before["technician_name"], "Tec");

    let (status, updated) = send(
        &app,
        test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({ "priority": "critical" })),
        &ana.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Request updated");

    let (_, after) = send(&app, test::TestRequest::get().uri(&uri), &ana.token).await;
    assert_eq!(after["priority"], "critical");
    assert_eq!(without(after, "priority"), without(before, "priority"));
}

#[actix_web::test]
async fn test_request_moves_through_stages() {
    let app = test::init_service(app(state())).await;
    let ana = signup(&app, "Ana", "ana@x.com", "pw1").await;

    let (_, created) = send(
        &app,
        test::TestRequest::post().uri("/api/maintenance/requests").set_json(json!({
            "subject": "Broken valve",
            "request_type": "corrective",
            "technician_user_id": ana.user.id
        })),
        &ana.token,
    )
    .await;
    let uri = format!("/api/maintenance/requests/{}", created["id"]);

    let (status, _) = send(
        &app,
        test::TestRequest::put().uri(&uri).set_json(json!({
            "stage_id": 3,
            "kanban_state": "done",
            "technician_user_id": null
        })),
        &ana.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, request) = send(&app, test::TestRequest::get().uri(&uri), &ana.token).await;
    assert_eq!(request["stage_name"], "Repaired");
    assert_eq!(request["kanban_state"], "done");
    assert_eq!(request["technician_id"], json!(null));

    let (status, _) = send(
        &app,
        test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({ "stage_id": 99 })),
        &ana.token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_request_validation() {
    let app = test::init_service(app(state())).await;
    let token = signup(&app, "Ana", "ana@x.com", "pw1").await.token;

    let (status, body) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/maintenance/requests")
            .set_json(json!({ "request_type": "corrective" })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Subject is required");

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/maintenance/requests")
            .set_json(json!({ "subject": "Noise", "request_type": "cosmetic" })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        test::TestRequest::post().uri("/api/maintenance/requests").set_json(json!({
            "subject": "Noise",
            "request_type": "corrective",
            "equipment_id": 7
        })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        test::TestRequest::get().uri("/api/maintenance/requests/5"),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Maintenance request 5 was not found");

    let (status, _) = send(
        &app,
        test::TestRequest::put()
            .uri("/api/maintenance/requests/5")
            .set_json(json!({ "priority": "high" })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
