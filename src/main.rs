use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::StatusCode;
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::{error, info, warn};

use catalog_facets as api;
use catalog_facets::cache::{CacheBackend, InMemoryCache};
use catalog_facets::events::EventHandler;
use catalog_facets::services::i18n::{CachingTranslator, IdentityTranslator, Localizer, TranslationWarmer};
use catalog_facets::services::media::{BaseUrlMediaResolver, MediaResolver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Shared collaborators
    let cache: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
    let translator = Arc::new(CachingTranslator::new(
        Arc::new(IdentityTranslator),
        cache.clone(),
        None,
    ));
    let localizer = Arc::new(Localizer::new(
        translator,
        cfg.catalog.source_language.clone(),
        cfg.catalog.supported_languages.clone(),
    ));
    let media: Arc<dyn MediaResolver> =
        Arc::new(BaseUrlMediaResolver::new(cfg.catalog.media_base_url.clone()));

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.outbox.channel_capacity);
    let event_sender = api::events::EventSender::new(event_tx);

    let handlers: Vec<Arc<dyn EventHandler>> =
        vec![Arc::new(TranslationWarmer::new(db_arc.clone(), localizer.clone()))];
    tokio::spawn(api::events::process_events(event_rx, handlers));

    let _outbox_worker = api::events::outbox::start_worker(
        db_arc.clone(),
        event_sender.clone(),
        cfg.outbox.poll_interval(),
        cfg.outbox.batch_size,
    );

    let services = api::handlers::AppServices::new(
        db_arc.clone(),
        cache,
        localizer,
        media,
        cfg.catalog.clone(),
    );

    let app_state = api::AppState {
        db: db_arc,
        config: cfg.clone(),
        event_sender,
        services,
    };

    let cors = if cfg.is_development() {
        warn!("Development environment: CORS allows any origin");
        CorsLayer::very_permissive()
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([http::Method::GET])
            .allow_headers(Any)
    };

    let app = api::app(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not Found") });

    // Bind and serve
    let ip: std::net::IpAddr = cfg
        .host
        .parse()
        .with_context(|| format!("invalid host address '{}'", cfg.host))?;
    let addr = SocketAddr::new(ip, cfg.port);
    info!("catalog-facets listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
