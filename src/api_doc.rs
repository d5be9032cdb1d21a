use actix_web::HttpResponse;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    domain::order_status::OrderStatus,
    models::{OrderItemResponse, OrderWithItems, ProductResponse, ProductsInfo},
    routes,
    utils::ErrorDetail,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Products, orders and order items behind JWT authentication."
    ),
    paths(
        routes::health_check,
        routes::obtain_token_pair,
        routes::refresh_access_token,
        routes::register,
        routes::get_products,
        routes::post_product,
        routes::get_products_info,
        routes::get_product,
        routes::put_product,
        routes::patch_product,
        routes::delete_product,
        routes::get_orders,
        routes::post_order,
        routes::get_order,
        routes::put_order,
        routes::patch_order,
        routes::delete_order,
        routes::get_user_orders,
        routes::get_order_items,
        get_schema
    ),
    components(schemas(
        ErrorDetail,
        OrderStatus,
        ProductResponse,
        ProductsInfo,
        OrderItemResponse,
        OrderWithItems
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "products", description = "Catalogue"),
        (name = "orders", description = "Orders and their items"),
        (name = "authentication", description = "JWT token pair and registration")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build()
            )
        );
    }
}

#[utoipa::path(
    get,
    path = "/api/schema/",
    tag = "schema",
    responses((status = 200, description = "OpenAPI 3 document"))
)]
#[tracing::instrument(
    "Serving api schema"
)]
pub async fn get_schema() -> HttpResponse{
    HttpResponse::Ok().json(ApiDoc::openapi())
}
