use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::{user_email::UserEmail, username::Username};

#[derive(Deserialize, Debug, Clone)]
pub struct Settings{
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JWTSettings,
    pub email: EmailSettings,
    pub cache: CacheSettings,
    pub throttle: ThrottleSettings,
    pub pagination: PaginationSettings,
    pub tasks: TaskSettings,
    /// Account created (or promoted) with admin rights at startup.
    #[serde(default)]
    pub admin: Option<AdminSettings>
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApplicationSettings{
    pub host: String,
    pub port: u16
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings{
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub name: String,
    pub max_connections: u32
}

impl DatabaseSettings {
    // Url of the server itself, used to create / drop databases
    pub fn get_database_url(&self) -> String{
        format!(
            "postgres://{}:{}@{}:{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port
        )
    }

    pub fn get_database_table_url(&self) -> String{
        format!("{}/{}", self.get_database_url(), self.name)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct JWTSettings{
    pub secret: SecretString,
    pub access_token_minutes: i64,
    pub refresh_token_hours: i64
}

#[derive(Deserialize, Debug, Clone)]
pub struct EmailSettings{
    pub api_uri: String,
    pub sender: String,
    pub authorization_token: SecretString,
    pub timeout_seconds: u64
}

impl EmailSettings {
    pub fn sender(&self) -> Result<UserEmail, String>{
        UserEmail::parse(self.sender.clone())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CacheSettings{
    pub ttl_seconds: u64,
    pub max_capacity: u64
}

#[derive(Deserialize, Debug, Clone)]
pub struct ThrottleSettings{
    pub anon_per_minute: u32,
    pub user_per_minute: u32
}

#[derive(Deserialize, Debug, Clone)]
pub struct PaginationSettings{
    pub page_size: i64,
    pub max_page_size: i64
}

#[derive(Deserialize, Debug, Clone)]
pub struct TaskSettings{
    pub max_retries: u32,
    pub retry_delay_ms: u64
}

#[derive(Deserialize, Debug, Clone)]
pub struct AdminSettings{
    pub username: String,
    pub email: String,
    pub password: SecretString
}

impl AdminSettings {
    pub fn parse(&self) -> Result<(Username, UserEmail), String>{
        let username = Username::parse(self.username.clone())?;
        let email = UserEmail::parse(self.email.clone())?;
        Ok((username, email))
    }
}

impl Settings{
    /// Reads `configuration/base.yaml`, then lets `APP_`-prefixed environment
    /// variables override single keys, e.g. `APP_APPLICATION__PORT=8080`.
    pub fn get() -> Result<Self, ConfigError>{
        Config::builder()
            .add_source(File::with_name("configuration/base.yaml"))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?
            .try_deserialize::<Settings>()
    }
}
