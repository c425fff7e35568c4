//! ProjectHub - A community directory of projects and the packages they use

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use projecthub::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxCountryRepository, SqlxPackageRepository, SqlxProjectRepository,
            SqlxSessionRepository, SqlxUserRepository,
        },
    },
    services::{
        build_transport, CountryService, FlagNotifier, FlashStore, PackageService,
        ProjectService, UserService,
    },
    templates::TemplateEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "projecthub=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ProjectHub...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let pending = db::migrations::pending_count(&pool).await?;
    if pending > 0 {
        tracing::info!("Applying {} pending migration(s)", pending);
    }
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Templates and mail
    let templates = Arc::new(TemplateEngine::load(config.templates.path.as_deref())?);
    let transport = build_transport(&config.mail)?;
    let notifier = Arc::new(FlagNotifier::new(
        templates,
        transport,
        config.server.clone(),
        &config.mail,
    )?);
    tracing::info!(
        "Flag notifications go to: [{}]",
        config.mail.manager_addresses().join(", ")
    );

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let package_repo = SqlxPackageRepository::boxed(pool.clone());
    let country_repo = SqlxCountryRepository::boxed(pool.clone());
    let project_repo = SqlxProjectRepository::boxed(pool.clone());

    // Initialize services
    let user_service = Arc::new(UserService::new(user_repo.clone(), session_repo));
    let package_service = Arc::new(PackageService::new(package_repo.clone(), notifier));
    let project_service = Arc::new(ProjectService::new(
        project_repo,
        user_repo,
        country_repo.clone(),
        package_repo,
    ));
    let country_service = Arc::new(CountryService::new(country_repo));

    match user_service.cleanup_expired_sessions().await {
        Ok(0) => {}
        Ok(removed) => tracing::info!("Removed {} expired session(s)", removed),
        Err(e) => tracing::warn!("Failed to clean up expired sessions: {}", e),
    }

    // Periodic session cleanup (hourly)
    {
        let user_service = user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = user_service.cleanup_expired_sessions().await {
                    tracing::warn!("Failed to clean up expired sessions: {}", e);
                }
            }
        });
    }

    let state = AppState {
        user_service,
        package_service,
        project_service,
        country_service,
        flash: Arc::new(FlashStore::new()),
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
