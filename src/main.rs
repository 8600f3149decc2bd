use std::{process, sync::Arc};

use rapport::{
    application::{
        core::{ChatCore, CoreCache, CoreRepos},
        error::AppError,
        reply::Reply,
    },
    cache::{self, CacheConfig, CacheStore},
    config::{self, Command, GroupsCommand, IdsArgs, Settings, StorageBackend, UsersCommand},
    domain::types::{GroupStatus, UserStatus},
    infra::{db::PostgresRepositories, error::InfraError, memory::MemoryStore, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command.unwrap_or(Command::Check) {
        Command::Migrate => run_migrate(&settings).await,
        Command::Check => run_check(&settings).await,
        Command::Groups(command) => run_groups(&settings, command).await,
        Command::Users(command) => run_users(&settings, command).await,
    }
}

async fn run_migrate(settings: &Settings) -> Result<(), AppError> {
    if settings.storage != StorageBackend::Postgres {
        return Err(AppError::validation(
            "migrations only apply to the postgres storage backend",
        ));
    }
    let repositories = connect_postgres(settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!("database migrations applied");
    Ok(())
}

async fn run_check(settings: &Settings) -> Result<(), AppError> {
    if settings.storage == StorageBackend::Postgres {
        let repositories = connect_postgres(settings).await?;
        repositories
            .health_check()
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
        info!("database reachable");
    }

    match connect_cache(settings).await? {
        Some(cache) => {
            cache
                .store
                .ping()
                .await
                .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
            info!(backend = cache.store.backend_name(), "cache reachable");
        }
        None => info!("cache disabled"),
    }
    Ok(())
}

async fn run_groups(settings: &Settings, command: GroupsCommand) -> Result<(), AppError> {
    let core = build_core(settings).await?;
    match command {
        GroupsCommand::Disable(IdsArgs { ids }) => {
            print_reply(&core.set_groups_status(&ids, GroupStatus::Disable).await)
        }
        GroupsCommand::Enable(IdsArgs { ids }) => {
            print_reply(&core.set_groups_status(&ids, GroupStatus::Normal).await)
        }
        GroupsCommand::Delete(IdsArgs { ids }) => print_reply(&core.delete_groups(&ids).await),
    }
}

async fn run_users(settings: &Settings, command: UsersCommand) -> Result<(), AppError> {
    let core = build_core(settings).await?;
    match command {
        UsersCommand::Disable(IdsArgs { ids }) => {
            print_reply(&core.set_users_status(&ids, UserStatus::Disable).await)
        }
        UsersCommand::Enable(IdsArgs { ids }) => {
            print_reply(&core.set_users_status(&ids, UserStatus::Normal).await)
        }
        UsersCommand::Purge(IdsArgs { ids }) => print_reply(&core.purge_users(&ids).await),
        UsersCommand::GrantAdmin(IdsArgs { ids }) => {
            print_reply(&core.set_admin(&ids, true).await)
        }
        UsersCommand::RevokeAdmin(IdsArgs { ids }) => {
            print_reply(&core.set_admin(&ids, false).await)
        }
    }
}

async fn build_core(settings: &Settings) -> Result<ChatCore, AppError> {
    let repos = match settings.storage {
        StorageBackend::Postgres => {
            CoreRepos::from_backend(Arc::new(connect_postgres(settings).await?))
        }
        StorageBackend::Memory => {
            warn!("memory storage is empty on every start; administrative changes are not kept");
            CoreRepos::from_backend(Arc::new(MemoryStore::new()))
        }
    };
    let cache = connect_cache(settings).await?;
    Ok(ChatCore::new(repos, cache))
}

async fn connect_postgres(settings: &Settings) -> Result<PostgresRepositories, AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| AppError::validation("database.url is not configured"))?;
    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    Ok(PostgresRepositories::new(pool))
}

async fn connect_cache(settings: &Settings) -> Result<Option<CoreCache>, AppError> {
    let config = CacheConfig::from(&settings.cache);
    if !config.is_enabled() {
        return Ok(None);
    }
    let store: Arc<dyn CacheStore> = cache::connect_store(&config)
        .await
        .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
    Ok(Some(CoreCache { store, config }))
}

fn print_reply<T: Serialize>(reply: &Reply<T>) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(reply)
        .map_err(|err| AppError::unexpected(format!("failed to encode reply: {err}")))?;
    println!("{rendered}");
    if reply.is_ok() {
        Ok(())
    } else {
        Err(AppError::unexpected(reply.message.clone()))
    }
}
