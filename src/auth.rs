use actix_web::{
    post,
    web::{Data, Json},
    HttpResponse,
};
use log::warn;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    models::{AppState, UserSummary},
    session::{self, Registration},
};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginSubmission {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SignupSubmission {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    /// `super_admin`, `maintenance_staff` or `end_user`
    role: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub token: String,
    pub user: UserSummary,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[utoipa::path(
    context_path = "/api",
    request_body(content = LoginSubmission, content_type = "application/json", example = json!({
        "email": "admin@test.com",
        "password": "123456"
    })),
    responses(
        (status = 200, description = "Session issued", body = AuthResponse, example = json!({
            "token": "eyJhbGciOiJIUzI1NiJ9...",
            "user": { "id": 1, "name": "Admin", "role": "admin" }
        })),
        (status = 401, description = "Missing, unreadable or invalid credentials")
    )
)]
#[post("/login")]
pub async fn login(
    data: Data<AppState>,
    submission: Result<Json<LoginSubmission>, actix_web::Error>,
) -> Result<HttpResponse, ApiError> {
    // Every failed login answers 401, including unreadable bodies.
    let Json(submission) = submission.map_err(|err| {
        warn!("Unreadable login body: {err}");
        ApiError::MissingCredentials
    })?;
    let (Some(email), Some(password)) = (non_empty(submission.email), submission.password) else {
        return Err(ApiError::MissingCredentials);
    };
    if password.is_empty() {
        return Err(ApiError::MissingCredentials);
    }

    let session =
        session::authenticate(data.store.as_ref(), &data.sessions, &email, &password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        message: None,
        user: UserSummary::from(&session.user),
        token: session.token,
    }))
}

#[utoipa::path(
    context_path = "/api",
    request_body(content = SignupSubmission, content_type = "application/json", example = json!({
        "name": "Ana",
        "email": "ana@x.com",
        "password": "pw1",
        "role": "maintenance_staff"
    })),
    responses(
        (status = 201, description = "Account created and session issued", body = AuthResponse),
        (status = 400, description = "Missing fields or email already registered"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("/signup")]
pub async fn signup(
    data: Data<AppState>,
    Json(submission): Json<SignupSubmission>,
) -> Result<HttpResponse, ApiError> {
    let (Some(name), Some(email), Some(password)) = (
        non_empty(submission.name),
        non_empty(submission.email),
        submission.password.filter(|password| !password.is_empty()),
    ) else {
        return Err(ApiError::Validation(
            "Name, email, and password are required".to_string(),
        ));
    };

    let session = session::register(
        data.store.as_ref(),
        &data.sessions,
        Registration {
            name,
            email,
            password,
            role_hint: submission.role,
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(AuthResponse {
        message: Some("Account created successfully".to_string()),
        user: UserSummary::from(&session.user),
        token: session.token,
    }))
}
