use actix_web::{
    delete, get, post, put,
    web::{Data, Json, Path, Query},
    HttpResponse,
};
use log::info;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    models::{
        AppState, CreatedResponse, EquipmentChanges, EquipmentDetail, EquipmentFilter,
        EquipmentSummary, MessageResponse, NewEquipment, DEFAULT_CATEGORY_ID, DEFAULT_COMPANY_ID,
        DEFAULT_HEALTH_PERCENTAGE,
    },
};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct EquipmentSubmission {
    name: Option<String>,
    serial_number: Option<String>,
    category_id: Option<i32>,
    maintenance_team_id: Option<i32>,
    technician_user_id: Option<i32>,
    company_id: Option<i32>,
    location: Option<String>,
    /// 0 to 100, defaults to 100
    health_percentage: Option<i32>,
}

fn check_health(health_percentage: i32) -> Result<(), ApiError> {
    if (0..=100).contains(&health_percentage) {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Health percentage must be between 0 and 100, got {health_percentage}"
        )))
    }
}

#[utoipa::path(
    context_path = "/api/equipment",
    security(("bearer_token" = [])),
    params(EquipmentFilter),
    responses(
        (status = 200, description = "Lists equipment with the number of requests raised against each", body = Vec<EquipmentSummary>, example = json!([{
            "id": 1,
            "name": "CNC Lathe",
            "serial_number": "LT-2231",
            "health": 82,
            "location": "Workshop A",
            "category_id": 1,
            "maintenance_team_id": 1,
            "technician_user_id": null,
            "active_requests_count": 2
        }])),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("")]
pub async fn get_all_equipment(
    data: Data<AppState>,
    Query(filter): Query<EquipmentFilter>,
) -> Result<HttpResponse, ApiError> {
    let equipment = data.store.list_equipment(&filter).await?;
    Ok(HttpResponse::Ok().json(equipment))
}

#[utoipa::path(
    context_path = "/api/equipment",
    security(("bearer_token" = [])),
    params(("equipment_id" = i32, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "The requested equipment with its open request count", body = EquipmentDetail),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "The requested equipment was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/{equipment_id}")]
pub async fn get_equipment(
    data: Data<AppState>,
    path: Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let equipment_id = path.into_inner();

    match data.store.equipment_detail(equipment_id).await? {
        Some(equipment) => Ok(HttpResponse::Ok().json(equipment)),
        None => Err(ApiError::NotFound(format!(
            "Equipment {equipment_id} was not found"
        ))),
    }
}

#[utoipa::path(
    context_path = "/api/equipment",
    security(("bearer_token" = [])),
    request_body(content = EquipmentSubmission, content_type = "application/json", example = json!({
        "name": "Hydraulic Press",
        "serial_number": "HP-0042",
        "location": "Hall B",
        "health_percentage": 75
    })),
    responses(
        (status = 201, description = "The equipment was created", body = CreatedResponse),
        (status = 400, description = "The name is missing or a field is invalid"),
        (status = 401, description = "Missing or invalid session token"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("")]
pub async fn add_equipment(
    data: Data<AppState>,
    Json(submission): Json<EquipmentSubmission>,
) -> Result<HttpResponse, ApiError> {
    let name = submission
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Equipment name is required".to_string()))?;
    let health_percentage = submission
        .health_percentage
        .unwrap_or(DEFAULT_HEALTH_PERCENTAGE);
    check_health(health_percentage)?;

    let equipment = data
        .store
        .insert_equipment(NewEquipment {
            name,
            serial_number: submission.serial_number,
            category_id: Some(submission.category_id.unwrap_or(DEFAULT_CATEGORY_ID)),
            maintenance_team_id: submission.maintenance_team_id,
            technician_user_id: submission.technician_user_id,
            health_percentage,
            location: submission.location,
            company_id: Some(submission.company_id.unwrap_or(DEFAULT_COMPANY_ID)),
        })
        .await
        .map_err(|err| ApiError::from(err).during("creating equipment"))?;
    info!("Created equipment {} ({})", equipment.id, equipment.name);

    Ok(HttpResponse::Created().json(CreatedResponse {
        message: "Equipment created successfully".to_string(),
        id: equipment.id,
    }))
}

#[utoipa::path(
    context_path = "/api/equipment",
    security(("bearer_token" = [])),
    params(("equipment_id" = i32, Path, description = "Equipment id")),
    request_body(content = EquipmentChanges, content_type = "application/json", example = json!({
        "health_percentage": 25,
        "technician_user_id": null
    })),
    responses(
        (status = 200, description = "The equipment was updated", body = MessageResponse),
        (status = 400, description = "A field is invalid"),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "The requested equipment was not found"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[put("/{equipment_id}")]
pub async fn update_equipment(
    data: Data<AppState>,
    path: Path<i32>,
    Json(changes): Json<EquipmentChanges>,
) -> Result<HttpResponse, ApiError> {
    let equipment_id = path.into_inner();

    if changes
        .name
        .as_deref()
        .map_or(false, |name| name.trim().is_empty())
    {
        return Err(ApiError::Validation("Equipment name cannot be empty".to_string()));
    }
    if let Some(health_percentage) = changes.health_percentage {
        check_health(health_percentage)?;
    }

    data.store
        .update_equipment(equipment_id, changes)
        .await
        .map_err(|err| ApiError::from(err).during("updating equipment"))?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Equipment updated successfully")))
}

#[utoipa::path(
    context_path = "/api/equipment",
    security(("bearer_token" = [])),
    params(("equipment_id" = i32, Path, description = "Equipment id")),
    responses(
        (status = 200, description = "The equipment was deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid session token"),
        (status = 404, description = "The requested equipment was not found"),
        (status = 409, description = "Maintenance requests still reference the equipment"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[delete("/{equipment_id}")]
pub async fn delete_equipment(
    data: Data<AppState>,
    path: Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let equipment_id = path.into_inner();

    let equipment = data
        .store
        .delete_equipment(equipment_id)
        .await
        .map_err(|err| ApiError::from(err).during("deleting equipment"))?;
    info!("Deleted equipment {} ({})", equipment.id, equipment.name);

    Ok(HttpResponse::Ok().json(MessageResponse::new("Equipment deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_must_be_a_percentage() {
        assert!(check_health(0).is_ok());
        assert!(check_health(100).is_ok());
        assert!(matches!(check_health(101), Err(ApiError::Validation(_))));
        assert!(matches!(check_health(-5), Err(ApiError::Validation(_))));
    }
}
