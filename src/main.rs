use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use yatube::auth::password;
use yatube::config::{Cli, Command, Config};
use yatube::db::{self, groups, users};
use yatube::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(AppState::new(pool, config)).await,
        Command::AddGroup {
            title,
            slug,
            description,
        } => {
            let conn = pool.get()?;
            let id = groups::create(&conn, &title, &slug, &description)?;
            println!("Created group '{}' (id {})", slug, id);
            Ok(())
        }
        Command::CreateUser {
            username,
            password: plain,
            admin,
        } => {
            let hash = password::hash_password(&plain, config.auth.bcrypt_cost)?;
            let conn = pool.get()?;
            let id = users::create(
                &conn,
                &users::NewUser {
                    username: &username,
                    password_hash: &hash,
                    is_admin: admin,
                    ..Default::default()
                },
            )?;
            println!("Created user '{}' (id {})", username, id);
            Ok(())
        }
    }
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;
    let app = yatube::routes::app(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
