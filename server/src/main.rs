mod config;
mod gate;
mod graphql;
mod http;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authz::AccessPolicy;
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

use crate::{
    config::AppConfig,
    graphql::GraphqlData,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "backoffice-server", version, about = "CRM back-office access gate")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Seed the permission catalog and system roles.
    Seed(SeedCommand),
    /// Print a bearer token for an existing user.
    Token {
        #[arg(long)]
        email: String,
    },
    /// Validate and print the page and API access tables.
    #[command(name = "check-map")]
    CheckMap,
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

#[derive(Args, Debug)]
struct SeedCommand {
    /// Create this user if needed and grant it SUPER_ADMIN.
    #[arg(long)]
    admin_email: Option<String>,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, Arc::new(AppConfig::load()?)).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Seed(cmd) => run_seed(cmd).await,
        Command::Token { email } => print_token(&email, &AppConfig::load()?).await,
        Command::CheckMap => check_map(&AppConfig::load()?),
    }
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings).await.map_err(Into::into)
}

fn build_policy(config: &AppConfig) -> Result<AccessPolicy> {
    let policy = AccessPolicy::standard().context("invalid access tables")?;
    Ok(policy.with_api_mode(config.api_authorization))
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let policy = Arc::new(build_policy(&config)?);
    let pool = setup_pool().await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let schema = graphql::build_schema(GraphqlData {
        pool: pool.clone(),
        policy: policy.clone(),
    });
    let state = AppState {
        pool,
        schema,
        config,
        policy,
    };
    http::serve(cmd.into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        bail!(
            "pending migrations detected; run `backoffice-server migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

async fn run_seed(cmd: SeedCommand) -> Result<()> {
    let pool = setup_pool().await?;
    let summary = platform_db::seed_catalog(&pool).await?;
    println!(
        "permissions created: {}, roles created: {}",
        summary.permissions_created, summary.roles_created
    );
    if let Some(email) = cmd.admin_email {
        let user = platform_db::upsert_user(&pool, &email, None).await?;
        let super_admin = platform_db::list_roles(&pool)
            .await?
            .into_iter()
            .find(|record| record.role.name == "SUPER_ADMIN")
            .context("SUPER_ADMIN role missing after seeding")?;
        platform_db::assign_role(&pool, user.id, super_admin.role.id).await?;
        println!("{} holds SUPER_ADMIN", user.email);
    }
    Ok(())
}

async fn print_token(email: &str, config: &AppConfig) -> Result<()> {
    let pool = setup_pool().await?;
    let Some(user) = platform_db::find_user_by_email(&pool, email).await? else {
        bail!("no user with email {email}");
    };
    let token = platform_authn::issue_token(user.id, &config.auth)?;
    println!("{token}");
    Ok(())
}

fn check_map(config: &AppConfig) -> Result<()> {
    let policy = build_policy(config)?;
    println!("pages ({} entries):", policy.pages().len());
    for (path, resources) in policy.pages().entries() {
        println!("  {path} -> {}", join(resources));
    }
    println!("api ({} entries, {:?}):", policy.api().len(), policy.api_mode());
    for (path, resources) in policy.api().entries() {
        println!("  {path} -> {}", join(resources));
    }
    Ok(())
}

fn join(resources: &[platform_authz::Resource]) -> String {
    resources
        .iter()
        .map(|resource| resource.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
