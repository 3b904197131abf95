//! Maintenance management backend: equipment, maintenance requests, teams and
//! user accounts behind a bearer-token JSON API.

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web::{self, Data},
    App, Error,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod equipment;
pub mod error;
pub mod middleware;
pub mod models;
pub mod request;
pub mod session;
pub mod stage;
pub mod store;
pub mod team;

use error::ApiError;
use middleware::RequireSession;
use models::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::signup,
        dashboard::get_dashboard_stats,
        request::get_all_requests,
        request::get_request,
        request::add_request,
        request::update_request,
        equipment::get_all_equipment,
        equipment::get_equipment,
        equipment::add_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        team::get_all_teams,
        team::add_team,
        team::update_team,
        team::delete_team,
        stage::get_all_stages,
    ),
    components(schemas(
        auth::LoginSubmission,
        auth::SignupSubmission,
        auth::AuthResponse,
        models::UserSummary,
        models::UserRole,
        models::RequestType,
        models::Priority,
        models::KanbanState,
        models::Stage,
        models::Team,
        models::TeamChanges,
        team::TeamSubmission,
        models::EquipmentSummary,
        models::EquipmentDetail,
        models::MaintenanceStats,
        models::EquipmentChanges,
        equipment::EquipmentSubmission,
        models::RequestView,
        models::RequestChanges,
        request::RequestSubmission,
        models::DashboardStats,
        models::MessageResponse,
        models::CreatedResponse,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Builds the application with every route registered. Everything under
/// `/api` except login and signup requires a session.
pub fn app(
    state: Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _| ApiError::Validation(err.to_string()).into());
    let query_config = web::QueryConfig::default()
        .error_handler(|err, _| ApiError::Validation(err.to_string()).into());

    App::new()
        .app_data(state)
        .app_data(json_config)
        .app_data(query_config)
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .service(
            web::scope("/api")
                .service(auth::login)
                .service(auth::signup)
                .service(
                    web::scope("/dashboard")
                        .wrap(RequireSession)
                        .service(dashboard::get_dashboard_stats),
                )
                .service(
                    web::scope("/maintenance/requests")
                        .wrap(RequireSession)
                        .service(request::get_all_requests)
                        .service(request::add_request)
                        .service(request::get_request)
                        .service(request::update_request),
                )
                .service(
                    web::scope("/equipment")
                        .wrap(RequireSession)
                        .service(equipment::get_all_equipment)
                        .service(equipment::add_equipment)
                        .service(equipment::get_equipment)
                        .service(equipment::update_equipment)
                        .service(equipment::delete_equipment),
                )
                .service(
                    web::scope("/teams")
                        .wrap(RequireSession)
                        .service(team::get_all_teams)
                        .service(team::add_team)
                        .service(team::update_team)
                        .service(team::delete_team),
                )
                .service(
                    web::scope("/stages")
                        .wrap(RequireSession)
                        .service(stage::get_all_stages),
                ),
        )
}
