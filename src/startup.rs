use std::{net::TcpListener, sync::Arc, time::Duration};

use actix_web::{
    body::MessageBody,
    dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse},
    error::InternalError,
    web, App, HttpResponse, HttpServer,
};
use anyhow::Context;
use diesel::{pg::Pg, r2d2::ConnectionManager, PgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use r2d2::Pool;
use tracing_actix_web::TracingLogger;

use crate::{
    api_doc::get_schema,
    auth::jwt::Tokenizer,
    cache::ResponseCache,
    configuration::{AdminSettings, DatabaseSettings, PaginationSettings, Settings},
    db_interaction::user::{insert_user_into_database, promote_user_to_admin},
    email_client::EmailClient,
    models::User,
    routes::{
        delete_order, delete_product, get_order, get_order_items, get_orders, get_product, get_products,
        get_products_info, get_user_orders, health_check, obtain_token_pair, patch_order, patch_product,
        post_order, post_product, put_order, put_product, refresh_access_token, register,
    },
    tasks::TaskQueue,
    telemetry::spawn_blocking_with_tracing,
    throttle::{spawn_housekeeping, Throttle, Throttler},
    utils::{get_pooled_connection, DbPool, ErrorDetail},
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

pub struct Application{
    pub host: String,
    pub port: u16,
    pub server: Server
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self, anyhow::Error>{
        let pool = get_connection_pool(&settings.database);
        run_migrations(&pool).await?;
        if let Some(admin) = &settings.admin {
            provision_admin(&pool, admin).await?;
        }

        let email_client = EmailClient::from_settings(&settings.email)?;
        // The worker lives as long as the server holds a queue handle
        let (tasks, _worker) = TaskQueue::start(email_client, &settings.tasks);

        let state = AppState::new(&settings, pool, tasks)?;
        spawn_housekeeping(state.throttler.clone());

        let listener = TcpListener::bind((settings.application.host.as_str(), settings.application.port))
            .context("Failed to bind address")?;
        let port = listener.local_addr()?.port();

        let server = HttpServer::new(move || build_app(state.clone()))
            .listen(listener)?
            .run();

        Ok(Self{
            host: settings.application.host,
            port,
            server
        })
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error>{
        self.server.await
    }
}

// Connections are opened lazily, so the app starts even while the database is down
pub fn get_connection_pool(settings: &DatabaseSettings) -> DbPool{
    Pool::builder()
        .max_size(settings.max_connections)
        .connection_timeout(Duration::from_secs(5))
        .build_unchecked(ConnectionManager::<PgConnection>::new(settings.get_database_table_url()))
}

fn apply_migrations(connection: &mut impl MigrationHarness<Pg>) -> Result<(), anyhow::Error>{
    connection.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to run pending migrations")?;
    Ok(())
}

#[tracing::instrument(
    "Running database migrations",
    skip_all
)]
pub async fn run_migrations(pool: &DbPool) -> Result<(), anyhow::Error>{
    let pool = pool.clone();

    spawn_blocking_with_tracing(move || {
        let mut conn = pool.get().context("Failed to get connection from pool")?;
        apply_migrations(&mut conn)
    })
    .await
    .context("Failed due to threadpool error")?
}

/// Makes sure the configured admin account exists and has admin rights. An
/// existing account keeps its password.
#[tracing::instrument(
    "Provisioning admin account",
    skip_all,
    fields(username = %admin.username)
)]
pub async fn provision_admin(pool: &DbPool, admin: &AdminSettings) -> Result<User, anyhow::Error>{
    let (username, email) = admin.parse()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid admin account settings")?;

    let conn = get_pooled_connection(pool).await?;
    if let Some(user) = promote_user_to_admin(conn, username.inner().to_string()).await? {
        return Ok(user)
    }

    let conn = get_pooled_connection(pool).await?;
    let user = insert_user_into_database(conn, username, email, admin.password.clone(), true)
        .await
        .context("Failed to create admin account")?;

    tracing::info!("Created admin account");
    Ok(user)
}

/// Everything the handlers pull out of app data.
#[derive(Clone)]
pub struct AppState{
    pub pool: web::Data<DbPool>,
    pub tokenizer: web::Data<Tokenizer>,
    pub cache: web::Data<ResponseCache>,
    pub tasks: web::Data<TaskQueue>,
    pub pagination: web::Data<PaginationSettings>,
    pub throttler: Arc<Throttler>
}

impl AppState {
    pub fn new(settings: &Settings, pool: DbPool, tasks: TaskQueue) -> Result<Self, anyhow::Error>{
        Ok(Self{
            pool: web::Data::new(pool),
            tokenizer: web::Data::new(Tokenizer::new(&settings.jwt)),
            cache: web::Data::new(ResponseCache::new(&settings.cache)),
            tasks: web::Data::new(tasks),
            pagination: web::Data::new(settings.pagination.clone()),
            throttler: Arc::new(Throttler::new(&settings.throttle)?)
        })
    }
}

fn bad_request(detail: String) -> HttpResponse{
    HttpResponse::BadRequest().json(ErrorDetail::new(detail))
}

async fn not_found() -> HttpResponse{
    HttpResponse::NotFound().json(ErrorDetail::new("Not found."))
}

pub fn build_app(state: AppState) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = ()
    >
>{
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let response = bad_request(err.to_string());
        InternalError::from_response(err, response).into()
    });

    let query_config = web::QueryConfig::default().error_handler(|err, _req| {
        let response = bad_request(err.to_string());
        InternalError::from_response(err, response).into()
    });

    // Malformed ids can never match a row
    let path_config = web::PathConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::NotFound().json(ErrorDetail::new("Not found."));
        InternalError::from_response(err, response).into()
    });

    App::new()
        .wrap(Throttle::new(state.throttler.clone()))
        .wrap(TracingLogger::default())
        .app_data(json_config)
        .app_data(query_config)
        .app_data(path_config)
        .app_data(state.pool)
        .app_data(state.tokenizer)
        .app_data(state.cache)
        .app_data(state.tasks)
        .app_data(state.pagination)
        .route("/health", web::get().to(health_check))
        .route("/api/schema/", web::get().to(get_schema))
        .route("/api/token/", web::post().to(obtain_token_pair))
        .route("/api/token/refresh/", web::post().to(refresh_access_token))
        .route("/api/register/", web::post().to(register))
        .service(
            web::resource("/products/")
                .route(web::get().to(get_products))
                .route(web::post().to(post_product))
        )
        // Before the detail route so "info" is not taken for an id
        .route("/products/info/", web::get().to(get_products_info))
        .service(
            web::resource("/products/{id}/")
                .route(web::get().to(get_product))
                .route(web::put().to(put_product))
                .route(web::patch().to(patch_product))
                .route(web::delete().to(delete_product))
        )
        .service(
            web::resource("/orders/")
                .route(web::get().to(get_orders))
                .route(web::post().to(post_order))
        )
        .service(
            web::resource("/orders/{order_id}/")
                .route(web::get().to(get_order))
                .route(web::put().to(put_order))
                .route(web::patch().to(patch_order))
                .route(web::delete().to(delete_order))
        )
        .route("/user-orders/", web::get().to(get_user_orders))
        .route("/order-items/", web::get().to(get_order_items))
        .default_service(web::to(not_found))
}
