mod common;

use actix_web::{http::StatusCode, test};
use gearguard_api::app;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{send, signup, state};

#[actix_web::test]
async fn test_team_lifecycle_restores_count() {
    let app = test::init_service(app(state())).await;
    let token = signup(&app, "Ana", "ana@x.com", "pw1").await.token;

    let (_, teams) = send(&app, test::TestRequest::get().uri("/api/teams"), &token).await;
    let initial = teams.as_array().unwrap().len();

    let (status, created) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/teams")
            .set_json(json!({ "name": "Alpha" })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Team created successfully");
    let uri = format!("/api/teams/{}", created["id"]);

    let (status, updated) = send(
        &app,
        test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({ "name": "Alpha2" })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], "Team updated successfully");

    let (_, teams) = send(&app, test::TestRequest::get().uri("/api/teams"), &token).await;
    let teams = teams.as_array().unwrap();
    assert_eq!(teams.len(), initial + 1);
    assert_eq!(teams[initial]["name"], "Alpha2");
    assert_eq!(teams[initial]["company_id"], 1);

    let (status, deleted) = send(&app, test::TestRequest::delete().uri(&uri), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "Team deleted successfully");

    let (_, teams) = send(&app, test::TestRequest::get().uri("/api/teams"), &token).await;
    let teams = teams.as_array().unwrap();
    assert_eq!(teams.len(), initial);
    assert!(teams.iter().all(|team| team["id"] != created["id"]));
}

#[actix_web::test]
async fn test_team_validation() {
    let app = test::init_service(app(state())).await;
    let token = signup(&app, "Ana", "ana@x.com", "pw1").await.token;

    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/teams")
            .set_json(json!({ "name": "  " })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        test::TestRequest::put()
            .uri("/api/teams/12")
            .set_json(json!({ "name": "Nobody" })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, test::TestRequest::delete().uri("/api/teams/12"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_team_in_use_cannot_be_deleted() {
    let app = test::init_service(app(state())).await;
    let token = signup(&app, "Ana", "ana@x.com", "pw1").await.token;

    let (_, team) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/teams")
            .set_json(json!({ "name": "Mechanics" })),
        &token,
    )
    .await;
    let (status, _) = send(
        &app,
        test::TestRequest::post()
            .uri("/api/equipment")
            .set_json(json!({ "name": "Lathe", "maintenance_team_id": team["id"] })),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        test::TestRequest::delete().uri(&format!("/api/teams/{}", team["id"])),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
