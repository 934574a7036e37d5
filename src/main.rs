use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use alunos::api::{self, AppState};
use alunos::auth::{MemoryAuth, PgAuth};
use alunos::config::Config;
use alunos::store::memory::MemoryStore;
use alunos::store::pg::PgStudentStore;

async fn state(config: &Config) -> anyhow::Result<AppState> {
    let state = match &config.database_url {
        Some(url) => {
            let pg = PgPoolOptions::new()
                .max_connections(config.db_connections)
                .connect(url)
                .await?;
            sqlx::migrate!("./migrations").run(&pg).await?;
            log::info!("Connected to database, migrations applied");
            AppState {
                store: Arc::new(PgStudentStore::new(pg.clone())),
                auth: Arc::new(PgAuth::new(pg, config.session_days)),
                page_size: config.page_size,
            }
        }
        None => {
            log::warn!("DATABASE_URL is not set, records and accounts live in memory only");
            AppState {
                store: Arc::new(MemoryStore::new()),
                auth: Arc::new(MemoryAuth::new(config.session_days)),
                page_size: config.page_size,
            }
        }
    };
    Ok(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::from_env()?;
    let app = api::router(state(&config).await?);

    log::info!("Starting Alunos HTTP Server on http://{}", config.bind);
    axum::Server::bind(&config.bind)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
