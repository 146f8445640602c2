use deskvote_core::{
    config::Configuration,
    error::{DeskError, DeskResult},
};

pub async fn migrate(config: Configuration) -> DeskResult<()> {
    let pool = config
        .db_conn()
        .await?
        .ok_or_else(|| DeskError::ConfigurationUnset("DATABASE_URL".to_string()))?;
    super::server::run_migrations(&pool).await?;
    pool.close().await;
    Ok(())
}
