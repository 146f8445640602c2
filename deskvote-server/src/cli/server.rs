use std::net::{SocketAddr, TcpListener};

use axum::Router;
use deskvote_core::{
    config::Configuration,
    error::{DeskError, DeskResult},
    package_full,
    state::DeskState,
};
use sqlx::PgPool;

use crate::api;

pub async fn run_migrations(db_conn: &PgPool) -> DeskResult<()> {
    info!("Migrating database");
    sqlx::migrate!("../migrations").run(db_conn).await?;
    info!("Database migrated!");
    Ok(())
}

pub fn setup_all_routes(router: Router<DeskState>, state: &DeskState) -> Router<DeskState> {
    let router = api::images::image_routes(router);
    let router = api::votes::vote_routes(router, state);
    let router = api::upload::upload_routes(router, state);
    let router = api::submit_setup::submit_routes(router, state);
    let router = api::files::file_routes(router, state.config());

    router
}

pub fn axum_setup(state: DeskState) -> Router {
    let router = Router::new();

    let router = setup_all_routes(router, &state);

    router.fallback(api::not_found).with_state(state)
}

pub async fn server_start(config: Configuration, migrate: bool) -> DeskResult<()> {
    info!("Starting with config {:?}", config);
    let db_conn = config.db_conn().await?;
    if let (Some(db_conn), true) = (&db_conn, migrate) {
        run_migrations(db_conn).await?;
    }
    debug!("Configuring application server");
    let state = DeskState::new(config.clone(), db_conn)?;

    let app = axum_setup(state.clone());

    let listener = TcpListener::bind(config.listen_on)?;
    info!("Listening on {}", config.listen_on);
    let server = axum::Server::from_tcp(listener)
        .map_err(|e| DeskError::Other(format!("could not listen: {}", e)))?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!("server error exit: {:?}", e);
    }

    state.close().await;
    info!("{} exited.", package_full());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
