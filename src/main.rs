use std::{future::IntoFuture, process, sync::Arc};

use time::OffsetDateTime;
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        error::AppError,
        follows::FollowService,
        listing::ListingService,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo, PostsWriteRepo,
            SessionsRepo, UsersRepo,
        },
        sessions::SessionService,
    },
    cache::{CacheConfig, IndexCacheState},
    config::{self, Command, GroupsCommand, SessionsCommand, UsersCommand},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        telemetry,
        uploads::MediaStorage,
    },
};

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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Users(UsersCommand::Create(args)) => run_create_user(settings, args).await,
        Command::Groups(GroupsCommand::Create(args)) => run_create_group(settings, args).await,
        Command::Sessions(SessionsCommand::Issue(args)) => run_issue_session(settings, args).await,
        Command::Sessions(SessionsCommand::Revoke(args)) => {
            run_revoke_session(settings, args).await
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let (http_state, admin_state) = build_application_context(repositories, &settings)?;
    serve_http(&settings, http_state, admin_state).await
}

async fn run_create_user(
    settings: config::Settings,
    args: config::CreateUserArgs,
) -> Result<(), AppError> {
    let accounts = account_service(init_repositories(&settings).await?);
    let user = accounts
        .create_user(&args.username, &args.first_name, &args.last_name)
        .await?;
    info!(
        target = "yatube::cli",
        user_id = user.id,
        username = %user.username,
        "user created"
    );
    Ok(())
}

async fn run_create_group(
    settings: config::Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    let accounts = account_service(init_repositories(&settings).await?);
    let group = accounts
        .create_group(&args.title, args.slug.as_deref(), &args.description)
        .await?;
    info!(
        target = "yatube::cli",
        group_id = group.id,
        slug = %group.slug,
        "group created"
    );
    Ok(())
}

async fn run_issue_session(
    settings: config::Settings,
    args: config::IssueSessionArgs,
) -> Result<(), AppError> {
    let sessions = session_service(init_repositories(&settings).await?);
    let expires_at = args
        .expires_in_days
        .map(|days| OffsetDateTime::now_utc() + time::Duration::days(i64::from(days)));
    let issued = sessions.issue(&args.username, expires_at).await?;

    // The token is shown once; only its digest is stored.
    println!("{}", issued.token);
    info!(
        target = "yatube::cli",
        prefix = %issued.record.prefix,
        "session issued"
    );
    Ok(())
}

async fn run_revoke_session(
    settings: config::Settings,
    args: config::RevokeSessionArgs,
) -> Result<(), AppError> {
    let sessions = session_service(init_repositories(&settings).await?);
    sessions.revoke(&args.prefix).await?;
    info!(target = "yatube::cli", prefix = %args.prefix, "session revoked");
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn account_service(repositories: Arc<PostgresRepositories>) -> AccountService {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    AccountService::new(users_repo, groups_repo)
}

fn session_service(repositories: Arc<PostgresRepositories>) -> SessionService {
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories;
    SessionService::new(sessions_repo, users_repo)
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<(HttpState, AdminState), AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();

    let media = Arc::new(
        MediaStorage::new(settings.uploads.directory.clone()).map_err(InfraError::from)?,
    );

    let listing = Arc::new(ListingService::new(
        posts_repo.clone(),
        groups_repo.clone(),
        users_repo.clone(),
        follows_repo.clone(),
        settings.listing.page_size,
    ));
    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo,
        comments_repo,
        groups_repo,
        media.clone(),
    ));
    let follows = Arc::new(FollowService::new(follows_repo, users_repo));
    let sessions = Arc::new(session_service(repositories));

    let index_cache = IndexCacheState::new(CacheConfig::from(&settings.cache));
    let upload_limit_bytes =
        usize::try_from(settings.uploads.max_request_bytes.get()).unwrap_or(usize::MAX);

    let http_state = HttpState {
        listing,
        posts,
        follows,
        sessions,
        media,
        index_cache: index_cache.clone(),
        cookie_secure: settings.sessions.cookie_secure,
        upload_limit_bytes,
    };
    let admin_state = AdminState {
        index_cache,
        health: health_repo,
    };

    Ok((http_state, admin_state))
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_addr = settings.server.public_addr;
    let admin_addr = settings.server.admin_addr;
    let public_listener = tokio::net::TcpListener::bind(public_addr)
        .await
        .map_err(|source| InfraError::Bind {
            role: "public",
            addr: public_addr,
            source,
        })?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|source| InfraError::Bind {
            role: "admin",
            addr: admin_addr,
            source,
        })?;

    info!(
        target = "yatube::serve",
        public = %public_addr,
        admin = %admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target = "yatube::serve", "shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let servers = async { try_join!(public_server.into_future(), admin_server.into_future()) };

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        wait_for_shutdown(shutdown_rx).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = deadline => {
            warn!(target = "yatube::serve", "graceful shutdown timed out");
        }
    }

    Ok(())
}

/// Resolves once shutdown was requested; never resolves if the signal task is gone.
async fn wait_for_shutdown(mut signal: watch::Receiver<bool>) {
    if signal.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
