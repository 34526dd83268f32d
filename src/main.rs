use actix_cors::Cors;
use actix_middleware::{initialize_jwt, JwtAuthMiddleware, Logging, RequestId};
use actix_web::{web, App, HttpServer};
use messaging_service::config::Config;
use messaging_service::services::PgUserDirectory;
use messaging_service::services::presence::spawn_typing_sweeper;
use messaging_service::state::AppState;
use messaging_service::{db, logging, routes};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const POOL_SAMPLE_INTERVAL: Duration = Duration::from_secs(15);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    logging::init_tracing();

    let config = Arc::new(Config::from_env().map_err(to_io_error)?);
    initialize_jwt(config.jwt_secret.as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let pool = db::init_pool(&config.database_url)
        .await
        .map_err(to_io_error)?;

    let directory = Arc::new(PgUserDirectory::new(pool.clone()));
    let state = web::Data::new(AppState::new(pool.clone(), config.clone(), directory));

    spawn_typing_sweeper(
        state.presence.clone(),
        state.registry.clone(),
        Duration::from_secs(config.typing_sweep_interval_secs),
    );
    db_pool::spawn_metrics_sampler(pool, db::SERVICE_NAME.to_owned(), POOL_SAMPLE_INTERVAL);

    let port = config.port;
    info!(port, "starting messaging service");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logging)
            .wrap(RequestId)
            .service(routes::health)
            .service(routes::metrics)
            .service(routes::wsroute::ws_connect)
            .service(
                web::scope("/api/v1")
                    .wrap(JwtAuthMiddleware)
                    .configure(routes::configure_api),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

fn to_io_error(e: messaging_service::error::AppError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}
