use std::str::FromStr;

use diesel::{Connection, PgConnection, RunQueryDsl};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use storefront::{
    auth::jwt::Tokenizer,
    configuration::{DatabaseSettings, Settings},
    db_interaction::user::insert_user_into_database,
    domain::{user_email::UserEmail, username::Username},
    email_client::EmailClient,
    models::{NewProduct, Product, User},
    schema::products,
    startup::{get_connection_pool, run_migrations, AppState, Application},
    tasks::TaskQueue,
    telemetry::{get_subscriber, init_subscriber},
    utils::DbPool,
};
use uuid::Uuid;
use wiremock::MockServer;

static LOGGER_INSTANCE: Lazy<()> = Lazy::new(|| {
    let log_level = "info".to_string();
    let name = "storefront-test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(name, log_level, std::io::stdout);
        init_subscriber(subscriber).expect("Failed to set subscriber");
    } else {
        let subscriber = get_subscriber(name, log_level, std::io::sink);
        init_subscriber(subscriber).expect("Failed to set subscriber");
    }
});

pub const PASSWORD: &str = "correct horse battery";

#[derive(Deserialize, Debug)]
pub struct TokenPairResponse{
    pub access: String,
    pub refresh: String
}

pub struct TestUser{
    pub user: User,
    pub access_token: String
}

pub struct TestApp{
    pub host: String,
    pub port: u16,
    pub pool: DbPool,
    pub email_api: MockServer,
    pub api_client: reqwest::Client
}

impl TestApp {
    async fn create_db(settings: &DatabaseSettings) -> DbPool{
        let mut connection = PgConnection::establish(&settings.get_database_url())
                                .expect("Failed to connect to postgres database");

        let query = format!(r#"CREATE DATABASE "{}";"#, settings.name);
        diesel::sql_query(query)
            .execute(&mut connection)
            .expect("Failed to create test database");

        let pool = get_connection_pool(settings);
        run_migrations(&pool).await.expect("Failed to run migrations");

        pool
    }

    pub fn get_app_url(&self) -> String{
        format!("http://{}:{}", self.host, self.port)
    }

    pub async fn spawn_app() -> TestApp{
        TestApp::spawn_app_with(|_| {}).await
    }

    pub async fn spawn_app_with(configure: impl FnOnce(&mut Settings)) -> TestApp{
        Lazy::force(&LOGGER_INSTANCE);

        let email_api = MockServer::start().await;

        let mut settings = Settings::get().expect("Failed to read configuration");
        settings.application.port = 0;
        settings.database.name = Uuid::new_v4().to_string();
        settings.email.api_uri = email_api.uri();
        settings.tasks.retry_delay_ms = 0;
        configure(&mut settings);

        let pool = TestApp::create_db(&settings.database).await;

        let application = Application::build(settings)
                            .await
                            .expect("Failed to build application");

        let host = application.host.clone();
        let port = application.port;
        tokio::task::spawn(application.server);

        let api_client = reqwest::Client::builder()
                            .build()
                            .unwrap();

        TestApp{
            host,
            port,
            pool,
            email_api,
            api_client
        }
    }

    pub async fn create_user(&self, username: &str, is_admin: bool) -> TestUser{
        let conn = self.pool.get().expect("Failed to get connection");
        let user = insert_user_into_database(
            conn,
            Username::parse(username.to_string()).unwrap(),
            UserEmail::parse(format!("{}@example.com", username)).unwrap(),
            SecretString::from(PASSWORD),
            is_admin
        )
        .await
        .expect("Failed to insert user");

        let tokens = self.obtain_tokens(username, PASSWORD).await;
        assert_eq!(tokens.status().as_u16(), 200);
        let tokens: TokenPairResponse = tokens.json().await.unwrap();

        TestUser{ user, access_token: tokens.access }
    }

    pub fn create_product(&self, name: &str, price: &str, stock: i32) -> Product{
        let mut conn = self.pool.get().expect("Failed to get connection");

        diesel::insert_into(products::table)
            .values(NewProduct{
                name: name.to_string(),
                description: format!("{} description", name),
                price: Decimal::from_str(price).unwrap(),
                stock
            })
            .get_result::<Product>(&mut conn)
            .expect("Failed to insert product")
    }

    pub fn product_stock(&self, product_id: i32) -> i32{
        use diesel::QueryDsl;

        let mut conn = self.pool.get().expect("Failed to get connection");
        products::table
            .find(product_id)
            .select(products::stock)
            .first::<i32>(&mut conn)
            .expect("Failed to read stock")
    }

    pub async fn obtain_tokens(&self, username: &str, password: &str) -> reqwest::Response{
        self.api_client.post(format!("{}/api/token/", self.get_app_url()))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to send request to token endpoint")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response{
        let mut request = self.api_client.get(format!("{}{}", self.get_app_url(), path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        request.send().await.expect("Failed to send request")
    }

    pub async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: &serde_json::Value
    ) -> reqwest::Response{
        let mut request = self.api_client
            .request(method, format!("{}{}", self.get_app_url(), path))
            .json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        request.send().await.expect("Failed to send request")
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> reqwest::Response{
        let mut request = self.api_client.delete(format!("{}{}", self.get_app_url(), path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        request.send().await.expect("Failed to send request")
    }
}

/// Settings for tests that never touch the database.
pub fn in_process_settings() -> Settings{
    Lazy::force(&LOGGER_INSTANCE);

    let mut settings = Settings::get().expect("Failed to read configuration");
    // Nothing listens here; connections are only attempted on demand
    settings.database.port = 1;
    settings
}

/// Application state without a reachable database or e-mail server.
pub fn in_process_state(settings: &Settings) -> AppState{
    let email_client = EmailClient::from_settings(&settings.email).expect("Failed to build email client");
    let (tasks, _) = TaskQueue::start(email_client, &settings.tasks);
    let pool = get_connection_pool(&settings.database);

    AppState::new(settings, pool, tasks).expect("Failed to build app state")
}

/// A signed access token for a user that only exists inside the token.
pub fn access_token_for(settings: &Settings, is_admin: bool) -> String{
    let user = User{
        user_id: Uuid::new_v4(),
        username: if is_admin { "admin".to_string() } else { "buyer".to_string() },
        email: "someone@example.com".to_string(),
        password: String::new(),
        is_admin
    };

    Tokenizer::new(&settings.jwt)
        .issue_pair(&user)
        .expect("Failed to sign token")
        .access
}
