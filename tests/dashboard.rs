mod common;

use actix_web::{http::StatusCode, test};
use gearguard_api::{app, models::DashboardStats};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{send, signup, state};

#[actix_web::test]
async fn test_dashboard_counts() {
    let app = test::init_service(app(state())).await;
    let ana = signup(&app, "Ana", "ana@x.com", "pw1").await;
    let tec = signup(&app, "Tec", "tec@x.com", "pw2").await;

    for health in [20, 80] {
        let (status, _) = send(
            &app,
            test::TestRequest::post()
                .uri("/api/equipment")
                .set_json(json!({ "name": format!("Pump {health}"), "health_percentage": health })),
            &ana.token,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let requests = [
        // Open and overdue, assigned to Ana.
        json!({
            "subject": "Overdue check",
            "request_type": "preventive",
            "technician_user_id": ana.user.id,
            "scheduled_date": "2020-01-01T08:00:00Z"
        }),
        // Open, scheduled far ahead.
        json!({
            "subject": "Future check",
            "request_type": "preventive",
            "technician_user_id": tec.user.id,
            "scheduled_date": "2999-01-01"
        }),
        // Closed, so neither open nor overdue.
        json!({
            "subject": "Already fixed",
            "request_type": "corrective",
            "stage_id": 3,
            "technician_user_id": ana.user.id,
            "scheduled_date": "2020-01-01"
        }),
    ];
    for request in requests {
        let (status, _) = send(
            &app,
            test::TestRequest::post()
                .uri("/api/maintenance/requests")
                .set_json(request),
            &ana.token,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let request = test::TestRequest::get()
        .uri("/api/dashboard/stats")
        .insert_header(common::bearer(&ana.token))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: DashboardStats = test::read_body_json(response).await;

    assert_eq!(
        stats,
        DashboardStats {
            total_open_requests: 2,
            critical_equipment: 1,
            overdue_tasks: 1,
            my_pending_tasks: 2,
        }
    );

    let (_, stats) = send(
        &app,
        test::TestRequest::get().uri("/api/dashboard/stats"),
        &tec.token,
    )
    .await;
    assert_eq!(stats["my_pending_tasks"], 1);
}
