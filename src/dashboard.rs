use actix_web::{get, web::Data, HttpResponse};
use time::OffsetDateTime;

use crate::{
    error::ApiError,
    middleware::CurrentUser,
    models::{AppState, DashboardStats},
};

#[utoipa::path(
    context_path = "/api/dashboard",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Request and equipment counts for the dashboard", body = DashboardStats, example = json!({
            "total_open_requests": 12,
            "critical_equipment": 2,
            "overdue_tasks": 3,
            "my_pending_tasks": 4
        })),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/stats")]
pub async fn get_dashboard_stats(
    data: Data<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let stats = data
        .store
        .dashboard_stats(user.id, OffsetDateTime::now_utc())
        .await?;

    Ok(HttpResponse::Ok().json(stats))
}
