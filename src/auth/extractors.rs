use actix_web::{http::{header, StatusCode}, web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use futures_util::future::{ready, Ready};
use thiserror::Error;
use uuid::Uuid;

use crate::utils::ErrorDetail;

use super::jwt::{Claims, Tokenizer};

// Extractor for any authenticated user
#[derive(Debug)]
pub struct Authenticated(pub Claims);

// Extractor for admin role
#[derive(Debug)]
pub struct AdminUser(pub Claims);

impl Authenticated {
    pub fn user_id(&self) -> Uuid {
        self.0.sub
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin()
    }
}

#[derive(Error, Debug)]
pub enum AuthError{
    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,
    #[error("Given token not valid for any token type")]
    InvalidToken,
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,
    #[error("Authentication is not configured")]
    Misconfigured
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotAuthenticated | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::PermissionDenied => StatusCode::FORBIDDEN,
            AuthError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        let mut response = HttpResponse::build(self.status_code());

        if self.status_code() == StatusCode::UNAUTHORIZED {
            response.insert_header((header::WWW_AUTHENTICATE, r#"Bearer realm="api""#));
        }

        response.json(ErrorDetail::new(self.to_string()))
    }
}

/// Token from an `Authorization: Bearer <token>` header, `None` when the header is absent.
pub fn bearer_token(req: &HttpRequest) -> Result<Option<&str>, AuthError>{
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(None)
    };

    let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme == "Bearer" && !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AuthError::InvalidToken)
    }
}

fn authenticate(req: &HttpRequest) -> Result<Claims, AuthError>{
    let tokenizer = req.app_data::<web::Data<Tokenizer>>()
        .ok_or(AuthError::Misconfigured)?;

    let token = bearer_token(req)?.ok_or(AuthError::NotAuthenticated)?;

    tokenizer.decode_access(token)
        .map_err(|_| AuthError::InvalidToken)
}

impl FromRequest for Authenticated {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ready(authenticate(req).map(Authenticated))
    }
}

impl FromRequest for AdminUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let result = authenticate(req).and_then(|claims| {
            if claims.is_admin() {
                Ok(AdminUser(claims))
            } else {
                Err(AuthError::PermissionDenied)
            }
        });

        ready(result)
    }
}
