use secrecy::SecretString;
use serde_json::json;
use storefront::{configuration::AdminSettings, startup::provision_admin};

use crate::helpers::{TestApp, TokenPairResponse, PASSWORD};

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn register_returns_the_new_user(){
    let app = TestApp::spawn_app().await;

    let response = app.send_json(
        reqwest::Method::POST,
        "/api/register/",
        None,
        &json!({ "username": "ada", "email": "ada@example.com", "password": PASSWORD })
    ).await;

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "ada");
    assert_eq!(body["email"], "ada@example.com");
    assert!(body.get("password").is_none());
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn register_rejects_a_taken_username(){
    let app = TestApp::spawn_app().await;
    app.create_user("grace", false).await;

    let response = app.send_json(
        reqwest::Method::POST,
        "/api/register/",
        None,
        &json!({ "username": "grace", "email": "other@example.com", "password": PASSWORD })
    ).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["username"].is_array());
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn register_reports_every_invalid_field(){
    let app = TestApp::spawn_app().await;

    let response = app.send_json(
        reqwest::Method::POST,
        "/api/register/",
        None,
        &json!({ "username": "", "email": "not-an-email", "password": "short" })
    ).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    for field in ["username", "email", "password"] {
        assert!(body[field].is_array(), "{} should be reported", field);
    }
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn token_pair_grants_access_and_refreshes(){
    let app = TestApp::spawn_app().await;
    app.create_user("linus", false).await;

    let response = app.obtain_tokens("linus", PASSWORD).await;
    assert_eq!(response.status().as_u16(), 200);
    let tokens: TokenPairResponse = response.json().await.unwrap();

    let response = app.get("/user-orders/", Some(&tokens.access)).await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app.send_json(
        reqwest::Method::POST,
        "/api/token/refresh/",
        None,
        &json!({ "refresh": tokens.refresh })
    ).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["access"].is_string());

    // A refresh token is not an access token
    let response = app.get("/user-orders/", Some(&tokens.refresh)).await;
    assert_eq!(response.status().as_u16(), 401);
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn wrong_password_is_unauthorized(){
    let app = TestApp::spawn_app().await;
    app.create_user("margaret", false).await;

    let response = app.obtain_tokens("margaret", "not the password").await;
    assert_eq!(response.status().as_u16(), 401);

    let response = app.obtain_tokens("nobody", PASSWORD).await;
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "No active account found with the given credentials");
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn configured_admin_is_created_at_startup(){
    let app = TestApp::spawn_app_with(|settings| {
        settings.admin = Some(AdminSettings{
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password: SecretString::from(PASSWORD)
        });
    }).await;

    let response = app.obtain_tokens("root", PASSWORD).await;
    assert_eq!(response.status().as_u16(), 200);
    let tokens: TokenPairResponse = response.json().await.unwrap();

    let response = app.send_json(
        reqwest::Method::POST,
        "/products/",
        Some(&tokens.access),
        &json!({ "name": "Lamp", "price": "10.00", "stock": 1 })
    ).await;
    assert_eq!(response.status().as_u16(), 201);
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn configured_admin_promotes_an_existing_account(){
    let app = TestApp::spawn_app().await;
    let user = app.create_user("grace", false).await;
    assert!(!user.user.is_admin);

    let admin = AdminSettings{
        username: "grace".to_string(),
        email: "grace@example.com".to_string(),
        password: SecretString::from("ignored for existing accounts")
    };
    let promoted = provision_admin(&app.pool, &admin).await.unwrap();

    assert_eq!(promoted.user_id, user.user.user_id);
    assert!(promoted.is_admin);

    // The password is left alone
    let response = app.obtain_tokens("grace", PASSWORD).await;
    assert_eq!(response.status().as_u16(), 200);
}
