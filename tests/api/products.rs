use reqwest::Method;
use serde_json::json;

use crate::helpers::TestApp;

fn names(page: &serde_json::Value) -> Vec<String> {
    page["results"].as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn admin_can_manage_products(){
    let app = TestApp::spawn_app().await;
    let admin = app.create_user("admin", true).await;
    let token = Some(admin.access_token.as_str());

    let response = app.send_json(
        Method::POST,
        "/products/",
        token,
        &json!({ "name": "Desk lamp", "description": "Warm light", "price": "24.50", "stock": 7 })
    ).await;
    assert_eq!(response.status().as_u16(), 201);
    let created: serde_json::Value = response.json().await.unwrap();
    assert_eq!(created["price"], "24.50");
    assert_eq!(created["in_stock"], true);
    let path = format!("/products/{}/", created["id"]);

    let response = app.send_json(Method::PATCH, &path, token, &json!({ "stock": 0 })).await;
    assert_eq!(response.status().as_u16(), 200);
    let patched: serde_json::Value = response.json().await.unwrap();
    assert_eq!(patched["name"], "Desk lamp");
    assert_eq!(patched["in_stock"], false);

    let response = app.send_json(
        Method::PUT,
        &path,
        token,
        &json!({ "name": "Floor lamp", "price": "80", "stock": 2 })
    ).await;
    assert_eq!(response.status().as_u16(), 200);
    let replaced: serde_json::Value = response.json().await.unwrap();
    assert_eq!(replaced["name"], "Floor lamp");
    assert_eq!(replaced["description"], "");

    let response = app.delete(&path, token).await;
    assert_eq!(response.status().as_u16(), 204);

    let response = app.get(&path, None).await;
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "No Product matches the given query.");
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn product_list_filters_and_orders(){
    let app = TestApp::spawn_app().await;
    app.create_product("Red chair", "40.00", 3);
    app.create_product("Blue chair", "55.00", 1);
    app.create_product("Oak table", "210.00", 2);
    app.create_product("Sold out stool", "15.00", 0);

    let page: serde_json::Value = app.get("/products/?name__icontains=CHAIR&ordering=-price", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(names(&page), vec!["Blue chair", "Red chair"]);

    let page: serde_json::Value = app.get("/products/?price__range=30,100", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 2);

    let page: serde_json::Value = app.get("/products/?search=table", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(names(&page), vec!["Oak table"]);

    // Out-of-stock products only show up on request
    let page: serde_json::Value = app.get("/products/?ordering=price", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 3);

    let page: serde_json::Value = app.get("/products/?in_stock=false&ordering=price", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(names(&page)[0], "Sold out stool");
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn product_list_is_paginated(){
    let app = TestApp::spawn_app().await;
    for i in 0..3 {
        app.create_product(&format!("Mug {}", i), "9.99", 5);
    }

    let page: serde_json::Value = app.get("/products/?page_size=2", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 3);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert!(page["next"].as_str().unwrap().contains("page=2"));
    assert!(page["previous"].is_null());

    let response = app.get("/products/?page_size=2&page=3", None).await;
    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Invalid page.");
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn product_info_aggregates_the_catalogue(){
    let app = TestApp::spawn_app().await;
    app.create_product("Pen", "1.50", 100);
    app.create_product("Notebook", "6.00", 0);

    let info: serde_json::Value = app.get("/products/info/", None)
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(info["count"], 2);
    assert_eq!(info["max_price"], "6.00");
    assert_eq!(info["min_price"], "1.50");
    assert_eq!(info["products"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn product_writes_invalidate_cached_lists(){
    let app = TestApp::spawn_app().await;
    let admin = app.create_user("admin", true).await;
    app.create_product("Kettle", "30.00", 4);

    let response = app.get("/products/", None).await;
    assert_eq!(response.headers()["x-cache"], "MISS");
    let response = app.get("/products/", None).await;
    assert_eq!(response.headers()["x-cache"], "HIT");

    let response = app.send_json(
        Method::POST,
        "/products/",
        Some(&admin.access_token),
        &json!({ "name": "Toaster", "price": "45.00", "stock": 1 })
    ).await;
    assert_eq!(response.status().as_u16(), 201);

    let response = app.get("/products/", None).await;
    assert_eq!(response.headers()["x-cache"], "MISS");
    let page: serde_json::Value = response.json().await.unwrap();
    assert_eq!(page["count"], 2);
}

#[actix_web::test]
#[ignore = "needs a Postgres server"]
async fn patch_keeps_stock_reserved_by_orders(){
    let app = TestApp::spawn_app().await;
    let admin = app.create_user("admin", true).await;
    let buyer = app.create_user("buyer", false).await;
    let kettle = app.create_product("Kettle", "30.00", 5);
    let path = format!("/products/{}/", kettle.id);

    // The admin has seen stock 5; an order then reserves two units
    let response = app.send_json(
        Method::POST,
        "/orders/",
        Some(&buyer.access_token),
        &json!({ "items": [{ "product": kettle.id, "quantity": 2 }] })
    ).await;
    assert_eq!(response.status().as_u16(), 201);

    let response = app.send_json(Method::PATCH, &path, Some(&admin.access_token), &json!({ "description": "Steel" })).await;
    assert_eq!(response.status().as_u16(), 200);
    let patched: serde_json::Value = response.json().await.unwrap();
    assert_eq!(patched["description"], "Steel");
    assert_eq!(patched["stock"], 3);
    assert_eq!(app.product_stock(kettle.id), 3);

    let response = app.send_json(Method::PATCH, &path, Some(&admin.access_token), &json!({ "price": "0" })).await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app.send_json(Method::PATCH, "/products/9999/", Some(&admin.access_token), &json!({})).await;
    assert_eq!(response.status().as_u16(), 404);
}
