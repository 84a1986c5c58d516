use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use attempt_engine::{
    app_state::AppState,
    auth::{AuthMiddleware, JwtService},
    config::Config,
    guard::RateLimitMiddleware,
    handlers,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    if std::env::var("APP_ENV").as_deref() == Ok("production") {
        config.validate_for_production();
    }

    let jwt_service = JwtService::new(&config.jwt_secret);
    let bind_addr = (config.web_server_host.clone(), config.web_server_port);
    let cors_origin = config.cors_allowed_origin.clone();

    let state = AppState::new(config)
        .await
        .expect("failed to initialize application state");

    log::info!("Starting attempt engine on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET", "POST", "PUT"])
            .allow_any_header()
            .supports_credentials();

        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::from(state.guard.clone()))
            .wrap(RateLimitMiddleware)
            .wrap(AuthMiddleware)
            .wrap(cors)
            .wrap(Logger::default())
            .service(handlers::health_check)
            .service(handlers::get_quiz)
            .service(handlers::start_attempt)
            .service(handlers::resume_attempt)
            .service(handlers::update_progress)
            .service(handlers::submit_attempt)
            .service(handlers::abandon_attempt)
            .service(handlers::list_my_attempts)
            .service(handlers::get_attempt)
            .service(handlers::attempt_statistics)
    })
    .bind(bind_addr)?
    .run()
    .await
}
