// src/main.rs
use std::sync::Arc;

use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client as S3Client;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use course_commerce::config::Config;
use course_commerce::media::S3MediaService;
use course_commerce::store::PgStore;
use course_commerce::{AppState, api, docs};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

    // S3-compatible hosts (MinIO, Beget) need path-style addressing.
    if let Some(endpoint) = &config.s3_endpoint {
        s3_config_builder = s3_config_builder
            .endpoint_url(endpoint)
            .force_path_style(true);
    }

    let media = S3MediaService::new(
        S3Client::from_conf(s3_config_builder.build()),
        config.s3_bucket.clone(),
        config.s3_public_base_url.clone(),
        config.presign_expiry,
    );

    let state = web::Data::new(AppState {
        store: Arc::new(store),
        media: Arc::new(media),
        jwt_secret: config.jwt_secret.clone(),
        webhook_secret: config.webhook_secret.clone(),
    });

    log::info!("listening on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Authenticated routes
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::courses::create_course)
                    .service(api::courses::get_course)
                    .service(api::courses::update_course)
                    .service(api::courses::delete_course)
                    .service(api::courses::create_lesson)
                    .service(api::lessons::get_lesson)
                    .service(api::lessons::delete_lesson)
                    .service(api::lessons::complete_lesson)
                    .service(api::lessons::evaluate_lesson)
                    .service(api::lessons::put_scorm_state)
                    .service(api::pages::save_draft)
                    .service(api::pages::publish)
                    .service(api::media::presigned_upload)
                    .service(api::media::seal_media)
                    .service(api::media::delete_media),
            )
            // Public: signed payment notifications and email links
            .service(api::webhooks::payment_webhook)
            .service(api::webhooks::unsubscribe)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
