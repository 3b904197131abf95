use std::{io, sync::Arc};

use actix_cors::Cors;
use actix_web::{middleware::Logger, web::Data, HttpServer};
use gearguard_api::{
    app,
    config::{Config, LogLevel},
    models::AppState,
    session::Sessions,
    store::PgStore,
};
use log::{error, info};
use sqlx::postgres::PgPoolOptions;
use time::Duration;

fn initialize_syslog(LogLevel(level): LogLevel) {
    if let Err(err) = syslog::init(syslog::Facility::LOG_DAEMON, level, Some("gearguard-api")) {
        eprintln!("WARNING! Syslog is unavailable, server logs will not be recorded: {err}");
    }
}

fn fail(message: String, kind: io::ErrorKind) -> io::Error {
    error!("{message}");
    eprintln!("{message}");
    io::Error::new(kind, message)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::from_env()
        .map_err(|err| fail(format!("ERROR: {err}"), io::ErrorKind::InvalidInput))?;
    initialize_syslog(config.log_level);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_lazy(&config.database_url)
        .map_err(|err| {
            fail(
                format!("ERROR: Failed to connect to the database: {err}"),
                io::ErrorKind::ConnectionRefused,
            )
        })?;
    info!("Connected to the database");

    let state = Data::new(AppState {
        store: Arc::new(PgStore::new(pool)),
        sessions: Sessions::new(
            config.jwt_secret.clone(),
            Duration::hours(config.token_ttl_hours),
            config.bcrypt_cost,
        ),
    });

    let cors_origin = config.cors_origin.clone();
    info!("Listening on {}:{}", config.bind_address, config.port);

    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
            None => Cors::permissive(),
        };

        app(state.clone()).wrap(Logger::default()).wrap(cors)
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}
