use actix_web::test;
use storefront::startup::build_app;

use crate::helpers::{access_token_for, in_process_settings, in_process_state};

#[actix_web::test]
async fn anonymous_callers_are_throttled_past_their_budget(){
    let mut settings = in_process_settings();
    settings.throttle.anon_per_minute = 2;
    let app = test::init_service(build_app(in_process_state(&settings))).await;

    for _ in 0..2 {
        let request = test::TestRequest::get().uri("/health").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 200);
    }

    let request = test::TestRequest::get().uri("/health").to_request();
    let response = test::call_service(&app, request).await;

    assert_eq!(response.status().as_u16(), 429);
    let retry_after: u64 = response.headers()
        .get("retry-after")
        .expect("Missing Retry-After header")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    let body: serde_json::Value = test::read_body_json(response).await;
    assert!(body["detail"].as_str().unwrap().starts_with("Request was throttled."));
}

#[actix_web::test]
async fn authenticated_callers_have_their_own_budget(){
    let mut settings = in_process_settings();
    settings.throttle.anon_per_minute = 1;
    settings.throttle.user_per_minute = 3;
    let app = test::init_service(build_app(in_process_state(&settings))).await;
    let token = access_token_for(&settings, false);

    let request = test::TestRequest::get().uri("/health").to_request();
    assert_eq!(test::call_service(&app, request).await.status().as_u16(), 200);
    let request = test::TestRequest::get().uri("/health").to_request();
    assert_eq!(test::call_service(&app, request).await.status().as_u16(), 429);

    for _ in 0..3 {
        let request = test::TestRequest::get()
            .uri("/health")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status().as_u16(), 200);
    }

    let request = test::TestRequest::get()
        .uri("/health")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    assert_eq!(test::call_service(&app, request).await.status().as_u16(), 429);
}
