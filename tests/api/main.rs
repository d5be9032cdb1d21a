mod authentication;
mod health_check;
mod helpers;
mod permissions;
mod products;
mod throttling;
