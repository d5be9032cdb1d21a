use std::{error::Error, fmt::Debug};

use actix_web::{http::{header, StatusCode}, web, HttpResponse, ResponseError};
use anyhow::Context;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    auth::jwt::{TokenError, TokenPair, Tokenizer},
    db_interaction::user::get_user_by_username,
    password::{verify_password, DUMMY_PASSWORD_HASH},
    utils::{error_fmt_chain, get_pooled_connection, DbPool, ErrorDetail, PoolGetError},
};

#[derive(Deserialize, Debug, ToSchema)]
pub struct TokenObtainRequest{
    pub username: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct TokenRefreshRequest{
    pub refresh: String
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct AccessToken{
    pub access: String
}

#[derive(Error)]
pub enum LoginError{
    #[error("No active account found with the given credentials")]
    InvalidCredentials,
    #[error("Token is invalid or expired")]
    InvalidToken,
    #[error("Failed to get connection from pool")]
    PoolError(#[from] PoolGetError),
    #[error("unexpected error occured")]
    UnexpectedError(#[from] anyhow::Error)
}

impl Debug for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

impl ResponseError for LoginError {
    fn status_code(&self) -> StatusCode {
        match self {
            LoginError::InvalidCredentials | LoginError::InvalidToken => StatusCode::UNAUTHORIZED,
            LoginError::PoolError(_) | LoginError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        match self {
            LoginError::InvalidCredentials | LoginError::InvalidToken => HttpResponse::Unauthorized()
                .insert_header((header::WWW_AUTHENTICATE, r#"Bearer realm="api""#))
                .json(ErrorDetail::new(self.to_string())),
            _ => {
                tracing::error!("{:?}", self);
                HttpResponse::InternalServerError().json(ErrorDetail::new("A server error occurred."))
            }
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/token/",
    tag = "authentication",
    request_body = TokenObtainRequest,
    responses(
        (status = 200, description = "Access and refresh token", body = TokenPair),
        (status = 401, description = "Wrong username or password")
    )
)]
#[tracing::instrument(
    "Issuing token pair",
    skip(pool, tokenizer, credentials),
    fields(username = %credentials.username)
)]
pub async fn obtain_token_pair(
    pool: web::Data<DbPool>,
    tokenizer: web::Data<Tokenizer>,
    credentials: web::Json<TokenObtainRequest>
) -> Result<HttpResponse, LoginError> {
    let credentials = credentials.into_inner();

    let conn = get_pooled_connection(&pool).await?;
    let user = get_user_by_username(conn, credentials.username).await?;

    // Unknown usernames pay for a hash too, so timing does not reveal them
    let stored_hash = user.as_ref()
        .map(|user| user.password.clone())
        .unwrap_or_else(|| DUMMY_PASSWORD_HASH.to_string());
    let verified = verify_password(credentials.password, stored_hash).await?;

    let user = match user {
        Some(user) if verified => user,
        Some(_) => {
            tracing::info!("Passwords did not match");
            return Err(LoginError::InvalidCredentials)
        },
        None => {
            tracing::info!("No user with this username");
            return Err(LoginError::InvalidCredentials)
        }
    };

    let pair = tokenizer.issue_pair(&user)
        .context("Failed to issue token pair")?;

    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/api/token/refresh/",
    tag = "authentication",
    request_body = TokenRefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessToken),
        (status = 401, description = "Not a valid refresh token")
    )
)]
#[tracing::instrument(
    "Refreshing access token",
    skip(tokenizer, body)
)]
pub async fn refresh_access_token(
    tokenizer: web::Data<Tokenizer>,
    body: web::Json<TokenRefreshRequest>
) -> Result<HttpResponse, LoginError> {
    match tokenizer.refresh(&body.refresh) {
        Ok(access) => Ok(HttpResponse::Ok().json(AccessToken{ access })),
        Err(TokenError::Signing(e)) => Err(LoginError::UnexpectedError(
            anyhow::Error::new(e).context("Failed to sign access token")
        )),
        Err(e) => {
            tracing::info!("Refusing refresh: {}", e);
            Err(LoginError::InvalidToken)
        }
    }
}
