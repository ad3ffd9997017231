use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;
use std::time::Duration;

use otp_signup::{
    config::{Config, SmsProvider},
    database::{create_pool, run_migrations},
    external::{LogSender, OtpSender, TwilioService},
    handlers,
    middlewares::create_cors,
    repositories::SeaOrmAccountRepository,
    services::{SignupService, SignupSettings},
    store::{EphemeralStore, MemoryStore, RedisStore},
    swagger::swagger_config,
    utils::JwtService,
};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration");

    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let store: Arc<dyn EphemeralStore> = match &config.store.redis_url {
        Some(url) => Arc::new(
            RedisStore::connect(url)
                .await
                .expect("Failed to connect to Redis"),
        ),
        None => {
            log::warn!("store.redis_url is not set; using a per-process in-memory store");
            let store = MemoryStore::new();
            store.spawn_purger(PURGE_INTERVAL);
            Arc::new(store)
        }
    };

    let jwt_service = JwtService::new(
        &config.jwt.secret,
        &config.jwt.issuer,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    let sender: Arc<dyn OtpSender> = match config.sms.provider {
        SmsProvider::Twilio => Arc::new(TwilioService::new(config.sms.twilio.clone())),
        SmsProvider::Log => {
            if config.app.is_production() {
                log::warn!("SMS provider is 'log' in production; codes will not be delivered");
            }
            Arc::new(LogSender)
        }
    };

    let signup_service = SignupService::new(
        SignupSettings::from(&config),
        store,
        Arc::new(SeaOrmAccountRepository::new(pool.clone())),
        sender,
        jwt_service,
    );

    log::info!(
        "Starting {} ({}) at {}:{}",
        config.app.name,
        config.app.env,
        config.server.host,
        config.server.port
    );

    let app_config = config.app.clone();
    let cors_origins = config.server.cors_origins.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&cors_origins))
            .app_data(web::Data::new(signup_service.clone()))
            .app_data(web::Data::new(app_config.clone()))
            .configure(swagger_config)
            .configure(handlers::health_config)
            .service(web::scope("/api/v1").configure(handlers::auth_config))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
