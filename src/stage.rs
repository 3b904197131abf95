use actix_web::{get, web::Data, HttpResponse};

use crate::{
    error::ApiError,
    models::{AppState, Stage},
};

#[utoipa::path(
    context_path = "/api/stages",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Maintenance stages in workflow order", body = Vec<Stage>, example = json!([{
            "id": 1,
            "name": "New Request",
            "sequence": 1,
            "is_closed": false,
            "is_scrap": false
        }])),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("")]
pub async fn get_all_stages(data: Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stages = data.store.list_stages().await?;
    Ok(HttpResponse::Ok().json(stages))
}
