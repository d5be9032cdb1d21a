use std::{error::Error, fmt::Debug};

use anyhow::Context;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl, SelectableHelper};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::{user_email::UserEmail, username::Username},
    models::User,
    password::hash_password,
    schema::users,
    telemetry::spawn_blocking_with_tracing,
    utils::{error_fmt_chain, DbConnection},
};

#[tracing::instrument(
    "Getting user by username",
    skip(conn)
)]
pub async fn get_user_by_username(
    mut conn: DbConnection,
    username: String
) -> Result<Option<User>, anyhow::Error> {
    spawn_blocking_with_tracing(move || {
        users::table
            .filter(users::username.eq(username))
            .select(User::as_select())
            .first::<User>(&mut conn)
            .optional()
            .context("Failed to query user by username")
    })
    .await
    .context("Failed due to threadpool error")?
}

/// Grants admin rights to an existing account; `None` when there is no such user.
#[tracing::instrument(
    "Promoting user to admin",
    skip(conn)
)]
pub async fn promote_user_to_admin(
    mut conn: DbConnection,
    username: String
) -> Result<Option<User>, anyhow::Error> {
    spawn_blocking_with_tracing(move || {
        diesel::update(users::table.filter(users::username.eq(username)))
            .set(users::is_admin.eq(true))
            .returning(User::as_returning())
            .get_result::<User>(&mut conn)
            .optional()
            .context("Failed to promote user")
    })
    .await
    .context("Failed due to threadpool error")?
}

// Error associated with inserting user to users table
#[derive(Error)]
pub enum UserInsertError{
    #[error("A user with that username already exists.")]
    UsernameTaken(#[source] diesel::result::Error),
    #[error("Failed due to threadpool error")]
    ThreadpoolError(#[from] tokio::task::JoinError),
    #[error("Failed to insert user")]
    QueryError(#[source] diesel::result::Error),
    #[error("unexpected hashing error occured")]
    UnexpectedError(#[from] anyhow::Error)
}

impl Debug for UserInsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        error_fmt_chain(f, &self.source())
    }
}

impl From<diesel::result::Error> for UserInsertError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _
            ) => UserInsertError::UsernameTaken(e),
            _ => UserInsertError::QueryError(e)
        }
    }
}

#[tracing::instrument(
    "Inserting user into the database",
    skip(conn, password),
    fields(username = %username.inner())
)]
pub async fn insert_user_into_database(
    mut conn: DbConnection,
    username: Username,
    email: UserEmail,
    password: SecretString,
    is_admin: bool
) -> Result<User, UserInsertError> {
    let password_hash = hash_password(password).await?;

    let user = User{
        user_id: Uuid::new_v4(),
        username: username.inner().to_string(),
        email: email.inner().to_string(),
        password: password_hash.expose_secret().to_string(),
        is_admin
    };

    let inserted = spawn_blocking_with_tracing(move || {
        diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result::<User>(&mut conn)
    })
    .await??;

    Ok(inserted)
}
