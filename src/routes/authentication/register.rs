use std::{error::Error, fmt::Debug};

use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{
    db_interaction::user::{insert_user_into_database, UserInsertError},
    domain::{user_email::UserEmail, username::Username},
    utils::{add_field_error, error_fmt_chain, get_pooled_connection, validation_errors_json, DbPool, ErrorDetail, PoolGetError},
};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegistrationForm{
    pub username: String,
    pub email: String,
    #[schema(value_type = String, format = Password)]
    pub password: SecretString
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct RegisteredUser{
    pub user_id: Uuid,
    pub username: String,
    pub email: String
}

impl RegistrationForm {
    fn parse(self) -> Result<(Username, UserEmail, SecretString), ValidationErrors>{
        let mut errors = ValidationErrors::new();

        let username = Username::parse(self.username)
            .map_err(|e| add_field_error(&mut errors, "username", e))
            .ok();

        let email = UserEmail::parse(self.email)
            .map_err(|_| add_field_error(&mut errors, "email", "Enter a valid email address."))
            .ok();

        if self.password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            add_field_error(
                &mut errors,
                "password",
                format!("Ensure this field has at least {} characters.", MIN_PASSWORD_LENGTH)
            );
        }

        match (username, email) {
            (Some(username), Some(email)) if errors.errors().is_empty() => Ok((username, email, self.password)),
            _ => Err(errors)
        }
    }
}

#[derive(Error)]
pub enum RegisterError{
    #[error("Invalid registration data")]
    ValidationError(#[from] ValidationErrors),
    #[error("A user with that username already exists.")]
    UsernameTaken,
    #[error("Failed to get connection from pool")]
    PoolError(#[from] PoolGetError),
    #[error("unexpected error occured")]
    UnexpectedError(#[source] UserInsertError)
}

impl Debug for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

impl From<UserInsertError> for RegisterError {
    fn from(e: UserInsertError) -> Self {
        match e {
            UserInsertError::UsernameTaken(_) => RegisterError::UsernameTaken,
            other => RegisterError::UnexpectedError(other)
        }
    }
}

impl ResponseError for RegisterError {
    fn status_code(&self) -> StatusCode {
        match self {
            RegisterError::ValidationError(_) | RegisterError::UsernameTaken => StatusCode::BAD_REQUEST,
            RegisterError::PoolError(_) | RegisterError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        match self {
            RegisterError::ValidationError(errors) => HttpResponse::BadRequest()
                .json(validation_errors_json(errors)),
            RegisterError::UsernameTaken => HttpResponse::BadRequest()
                .json(serde_json::json!({ "username": [self.to_string()] })),
            _ => {
                tracing::error!("{:?}", self);
                HttpResponse::InternalServerError().json(ErrorDetail::new("A server error occurred."))
            }
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/register/",
    tag = "authentication",
    request_body = RegistrationForm,
    responses(
        (status = 201, body = RegisteredUser),
        (status = 400, description = "Invalid data or username taken")
    )
)]
#[tracing::instrument(
    "User registration started",
    skip(pool, form),
    fields(username = %form.username)
)]
pub async fn register(
    pool: web::Data<DbPool>,
    form: web::Json<RegistrationForm>
) -> Result<HttpResponse, RegisterError> {
    let (username, email, password) = form.into_inner().parse()?;

    let conn = get_pooled_connection(&pool).await?;
    let user = insert_user_into_database(conn, username, email, password, false).await?;

    Ok(HttpResponse::Created().json(RegisteredUser{
        user_id: user.user_id,
        username: user.username,
        email: user.email
    }))
}
