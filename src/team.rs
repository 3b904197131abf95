use actix_web::{
    delete, get, post, put,
    web::{Data, Json, Path},
    HttpResponse,
};
use log::info;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    models::{
        AppState, CreatedResponse, MessageResponse, NewTeam, Team, TeamChanges,
        DEFAULT_COMPANY_ID,
    },
};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TeamSubmission {
    name: Option<String>,
    company_id: Option<i32>,
}

#[utoipa::path(
    context_path = "/api/teams",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Lists all maintenance teams", body = Vec<Team>, example = json!([{
            "id": 1,
            "name": "Mechanics",
            "company_id": 1,
            "created_at": "2024-01-01T12:00:00Z",
            "updated_at": "2024-01-01T12:00:00Z"
        }])),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("")]
pub async fn get_all_teams(data: Data<AppState>) -> Result<HttpResponse, ApiError> {
    let teams = data.store.list_teams().await?;
    Ok(HttpResponse::Ok().json(teams))
}

#[utoipa::path(
    context_path = "/api/teams",
    security(("bearer_token" = [])),
    request_body(content = TeamSubmission, content_type = "application/json", example = json!({
        "name": "External Support Team",
        "company_id": 1
    })),
    responses(
        (status = 201, description = "The team was created", body = CreatedResponse),
        (status = 400, description = "The team name is missing"),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("")]
pub async fn add_team(
    data: Data<AppState>,
    Json(submission): Json<TeamSubmission>,
) -> Result<HttpResponse, ApiError> {
    let name = submission
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Team name is required".to_string()))?;

    let team = data
        .store
        .insert_team(NewTeam {
            name,
            company_id: submission.company_id.unwrap_or(DEFAULT_COMPANY_ID),
        })
        .await
        .map_err(|err| ApiError::from(err).during("creating team"))?;
    info!("Created team {} ({})", team.id, team.name);

    Ok(HttpResponse::Created().json(CreatedResponse {
        message: "Team created successfully".to_string(),
        id: team.id,
    }))
}

#[utoipa::path(
    context_path = "/api/teams",
    security(("bearer_token" = [])),
    params(("team_id" = i32, Path, description = "Team id")),
    request_body(content = TeamChanges, content_type = "application/json", example = json!({
        "name": "Updated External Support Team"
    })),
    responses(
        (status = 200, description = "The team was updated", body = MessageResponse),
        (status = 400, description = "The team name is empty"),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "The requested team was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[put("/{team_id}")]
pub async fn update_team(
    data: Data<AppState>,
    path: Path<i32>,
    Json(changes): Json<TeamChanges>,
) -> Result<HttpResponse, ApiError> {
    let team_id = path.into_inner();

    if changes
        .name
        .as_deref()
        .map_or(false, |name| name.trim().is_empty())
    {
        return Err(ApiError::Validation("Team name cannot be empty".to_string()));
    }

    data.store
        .update_team(team_id, changes, OffsetDateTime::now_utc())
        .await
        .map_err(|err| ApiError::from(err).during("updating team"))?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Team updated successfully")))
}

#[utoipa::path(
    context_path = "/api/teams",
    security(("bearer_token" = [])),
    params(("team_id" = i32, Path, description = "Team id")),
    responses(
        (status = 200, description = "The team was deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "The requested team was not found"),
        (status = 409, description = "Equipment or requests still reference the team"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[delete("/{team_id}")]
pub async fn delete_team(data: Data<AppState>, path: Path<i32>) -> Result<HttpResponse, ApiError> {
    let team_id = path.into_inner();

    let team = data
        .store
        .delete_team(team_id)
        .await
        .map_err(|err| ApiError::from(err).during("deleting team"))?;
    info!("Deleted team {} ({})", team.id, team.name);

    Ok(HttpResponse::Ok().json(MessageResponse::new("Team deleted successfully")))
}
