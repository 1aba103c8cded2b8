use sqlx::postgres::PgPoolOptions;

use crate::config::Config;

pub async fn get_db_pool(config: &Config) -> Result<sqlx::Pool<sqlx::Postgres>, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database ready");
    Ok(pool)
}
