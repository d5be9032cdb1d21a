use actix_web::test;
use serde_json::json;
use storefront::startup::build_app;
use uuid::Uuid;

use crate::helpers::{access_token_for, in_process_settings, in_process_state};

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

#[actix_web::test]
async fn anonymous_callers_cannot_write_products(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;

    let request = test::TestRequest::post()
        .uri("/products/")
        .set_json(json!({ "name": "Lamp", "price": "10.00", "stock": 3 }))
        .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 401);
    assert!(response.headers().contains_key("www-authenticate"));
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["detail"], "Authentication credentials were not provided.");
}

#[actix_web::test]
async fn regular_users_cannot_write_products(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;
    let token = access_token_for(&settings, false);

    for request in [
        test::TestRequest::post().uri("/products/"),
        test::TestRequest::put().uri("/products/1/"),
        test::TestRequest::patch().uri("/products/1/"),
        test::TestRequest::delete().uri("/products/1/")
    ] {
        let request = request
            .insert_header(bearer(&token))
            .set_json(json!({ "name": "Lamp", "price": "10.00", "stock": 3 }))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status().as_u16(), 403);
    }
}

#[actix_web::test]
async fn garbage_tokens_are_rejected(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;

    let request = test::TestRequest::get()
        .uri("/orders/")
        .insert_header(bearer("not-a-jwt"))
        .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 401);
}

#[actix_web::test]
async fn order_routes_require_authentication(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;
    let order = format!("/orders/{}/", Uuid::new_v4());

    for uri in ["/orders/", "/user-orders/", "/order-items/", order.as_str()] {
        let request = test::TestRequest::get().uri(uri).to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status().as_u16(), 401, "{} should need a token", uri);
    }
}

#[actix_web::test]
async fn admin_product_payload_is_validated_before_saving(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;
    let token = access_token_for(&settings, true);

    let request = test::TestRequest::post()
        .uri("/products/")
        .insert_header(bearer(&token))
        .set_json(json!({ "name": "", "price": "0", "stock": -1 }))
        .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = test::read_body_json(response).await;
    assert_eq!(body["price"][0], "Price must be greater than 0");
    assert!(body["name"].is_array());
    assert!(body["stock"].is_array());
}

#[actix_web::test]
async fn malformed_product_filters_are_bad_requests(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;

    for uri in [
        "/products/?price=abc",
        "/products/?price__range=10",
        "/products/?ordering=colour",
        "/products/?in_stock=maybe"
    ] {
        let request = test::TestRequest::get().uri(uri).to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status().as_u16(), 400, "{} should be rejected", uri);
    }
}

#[actix_web::test]
async fn page_zero_is_not_found(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;

    let request = test::TestRequest::get().uri("/products/?page=0").to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 404);
}

#[actix_web::test]
async fn orders_without_items_are_rejected(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;
    let token = access_token_for(&settings, false);

    let cases = [
        (json!({ "items": [] }), "items"),
        (json!({ "items": [{ "product": 1, "quantity": 0 }] }), "items"),
        (json!({ "status": "shipped", "items": [{ "product": 1, "quantity": 1 }] }), "detail")
    ];

    for (body, field) in cases {
        let request = test::TestRequest::post()
            .uri("/orders/")
            .insert_header(bearer(&token))
            .set_json(&body)
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status().as_u16(), 400, "{} should be rejected", body);
        let error: serde_json::Value = test::read_body_json(response).await;
        assert!(error.get(field).is_some(), "{} should explain {}", error, field);
    }
}

#[actix_web::test]
async fn malformed_order_ids_are_not_found(){
    let settings = in_process_settings();
    let app = test::init_service(build_app(in_process_state(&settings))).await;
    let token = access_token_for(&settings, false);

    let request = test::TestRequest::get()
        .uri("/orders/not-a-uuid/")
        .insert_header(bearer(&token))
        .to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 404);
}
