use actix_web::test;
use storefront::startup::build_app;

use crate::helpers::{in_process_settings, in_process_state, TestApp};

#[actix_web::test]
async fn health_route_answers_without_a_database(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;

    let request = test::TestRequest::get().uri("/health").to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 200);
    let body = test::read_body(response).await;
    assert_eq!(body, "Working");
}

#[actix_web::test]
async fn schema_lists_the_api(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;

    let request = test::TestRequest::get().uri("/api/schema/").to_request();
    let schema: serde_json::Value = test::call_and_read_body_json(&app, request).await;

    assert_eq!(schema["info"]["title"], "Storefront API");
    assert!(schema["paths"]["/products/"].is_object());
    assert!(schema["paths"]["/orders/{order_id}/"].is_object());
    assert!(schema["components"]["securitySchemes"]["jwt"].is_object());
}

#[actix_web::test]
async fn unknown_routes_are_json_404s(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;

    let request = test::TestRequest::get().uri("/nowhere/").to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["detail"], "Not found.");
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn health_route_is_served_over_http(){
    let app = TestApp::spawn_app().await;

    let response = reqwest::get(format!("{}/health", app.get_app_url()))
                    .await
                    .expect("Failed to get response");

    assert_eq!(response.status().as_u16(), 200)
}
