use actix_web::{
    get, post, put,
    web::{Data, Json, Path},
    HttpResponse,
};
use log::info;
use serde::Deserialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    middleware::CurrentUser,
    models::{
        optional_timestamp, AppState, CreatedResponse, MessageResponse, NewRequest, Priority,
        RequestChanges, RequestType, RequestView, DEFAULT_COMPANY_ID,
    },
};

#[derive(Deserialize, ToSchema)]
pub struct RequestSubmission {
    subject: Option<String>,
    description: Option<String>,
    request_type: Option<RequestType>,
    equipment_id: Option<i32>,
    maintenance_team_id: Option<i32>,
    technician_user_id: Option<i32>,
    priority: Option<Priority>,
    /// Defaults to the first stage of the workflow
    stage_id: Option<i32>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    #[serde(default, deserialize_with = "optional_timestamp")]
    #[schema(value_type = Option<String>)]
    scheduled_date: Option<OffsetDateTime>,
}

#[utoipa::path(
    context_path = "/api/maintenance/requests",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Lists all maintenance requests with stage, equipment and technician names", body = Vec<RequestView>, example = json!([{
            "id": 1,
            "subject": "Oil leak",
            "description": "Leak under the main cylinder",
            "type": "corrective",
            "priority": "high",
            "stage_id": 1,
            "stage_name": "New Request",
            "equipment_id": 3,
            "equipment_name": "Hydraulic Press",
            "maintenance_team_id": null,
            "technician_id": null,
            "technician_name": "Unassigned",
            "created_by": 2,
            "kanban_state": "normal",
            "scheduled_date": "2024-03-01T00:00:00Z",
            "created_at": "2024-02-20T09:15:00Z",
            "company_id": 1
        }])),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("")]
pub async fn get_all_requests(data: Data<AppState>) -> Result<HttpResponse, ApiError> {
    let requests = data.store.list_requests().await?;
    Ok(HttpResponse::Ok().json(requests))
}

#[utoipa::path(
    context_path = "/api/maintenance/requests",
    security(("bearer_token" = [])),
    params(("request_id" = i32, Path, description = "Maintenance request id")),
    responses(
        (status = 200, description = "The requested maintenance request", body = RequestView),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "The requested maintenance request was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/{request_id}")]
pub async fn get_request(data: Data<AppState>, path: Path<i32>) -> Result<HttpResponse, ApiError> {
    let request_id = path.into_inner();

    match data.store.find_request(request_id).await? {
        Some(request) => Ok(HttpResponse::Ok().json(request)),
        None => Err(ApiError::NotFound(format!(
            "Maintenance request {request_id} was not found"
        ))),
    }
}

#[utoipa::path(
    context_path = "/api/maintenance/requests",
    security(("bearer_token" = [])),
    request_body(content = RequestSubmission, content_type = "application/json", example = json!({
        "subject": "Oil leak",
        "request_type": "corrective",
        "equipment_id": 3,
        "priority": "high",
        "scheduled_date": "2024-03-01"
    })),
    responses(
        (status = 201, description = "The maintenance request was created", body = CreatedResponse),
        (status = 400, description = "A required field is missing or a reference does not exist"),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("")]
pub async fn add_request(
    data: Data<AppState>,
    CurrentUser(user): CurrentUser,
    Json(submission): Json<RequestSubmission>,
) -> Result<HttpResponse, ApiError> {
    let subject = submission
        .subject
        .filter(|subject| !subject.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Subject is required".to_string()))?;
    let request_type = submission
        .request_type
        .ok_or_else(|| ApiError::Validation("Request type is required".to_string()))?;

    let request = data
        .store
        .insert_request(NewRequest {
            subject,
            description: submission.description,
            request_type,
            equipment_id: submission.equipment_id,
            maintenance_team_id: submission.maintenance_team_id,
            technician_user_id: submission.technician_user_id,
            priority: submission.priority.unwrap_or_default(),
            stage_id: submission.stage_id,
            scheduled_date: submission.scheduled_date,
            company_id: DEFAULT_COMPANY_ID,
            created_by: user.id,
        })
        .await
        .map_err(|err| ApiError::from(err).during("creating maintenance request"))?;
    info!("User {} created maintenance request {}", user.id, request.id);

    Ok(HttpResponse::Created().json(CreatedResponse {
        message: "Request created!".to_string(),
        id: request.id,
    }))
}

#[utoipa::path(
    context_path = "/api/maintenance/requests",
    security(("bearer_token" = [])),
    params(("request_id" = i32, Path, description = "Maintenance request id")),
    request_body(content = RequestChanges, content_type = "application/json", example = json!({
        "stage_id": 2,
        "technician_user_id": 4,
        "priority": "critical",
        "kanban_state": "blocked"
    })),
    responses(
        (status = 200, description = "The maintenance request was updated", body = MessageResponse),
        (status = 400, description = "A field is invalid or a reference does not exist"),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "The requested maintenance request was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[put("/{request_id}")]
pub async fn update_request(
    data: Data<AppState>,
    CurrentUser(user): CurrentUser,
    path: Path<i32>,
    Json(changes): Json<RequestChanges>,
) -> Result<HttpResponse, ApiError> {
    let request_id = path.into_inner();

    let request = data
        .store
        .update_request(request_id, changes)
        .await
        .map_err(|err| ApiError::from(err).during("updating maintenance request"))?;
    info!(
        "User {} updated maintenance request {} (stage {}, {:?})",
        user.id, request.id, request.stage_id, request.priority
    );

    Ok(HttpResponse::Ok().json(MessageResponse::new("Request updated")))
}
