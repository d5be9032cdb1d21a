pub mod api_doc;
pub mod auth;
pub mod cache;
pub mod configuration;
pub mod db_interaction;
pub mod domain;
pub mod email_client;
pub mod filters;
pub mod models;
pub mod pagination;
pub mod password;
pub mod routes;
pub mod schema;
pub mod startup;
pub mod tasks;
pub mod telemetry;
pub mod throttle;
pub mod utils;
