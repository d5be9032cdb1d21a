use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{configuration::JWTSettings, models::User};

#[derive(Clone)]
pub struct Tokenizer{
    secret: SecretString,
    access_lifetime: Duration,
    refresh_lifetime: Duration
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims{
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole{
    Admin,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType{
    Access,
    Refresh
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair{
    pub access: String,
    pub refresh: String
}

#[derive(Error, Debug)]
pub enum TokenError{
    #[error("Token is invalid or expired")]
    Invalid,
    #[error("Token has wrong type")]
    WrongType,
    #[error("Failed to sign token")]
    Signing(#[from] jsonwebtoken::errors::Error)
}

impl Tokenizer {
    pub fn new(settings: &JWTSettings) -> Self {
        Self{
            secret: settings.secret.clone(),
            access_lifetime: Duration::minutes(settings.access_token_minutes),
            refresh_lifetime: Duration::hours(settings.refresh_token_hours)
        }
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError>{
        let role = if user.is_admin {
            UserRole::Admin
        } else {
            UserRole::User
        };

        Ok(TokenPair{
            access: self.sign(user.user_id, &user.username, &user.email, role, TokenType::Access)?,
            refresh: self.sign(user.user_id, &user.username, &user.email, role, TokenType::Refresh)?
        })
    }

    /// Exchanges a refresh token for a fresh access token carrying the same identity.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, TokenError>{
        let claims = self.decode_key(refresh_token).ok_or(TokenError::Invalid)?;

        if claims.token_type != TokenType::Refresh {
            return Err(TokenError::WrongType)
        }

        self.sign(claims.sub, &claims.username, &claims.email, claims.role, TokenType::Access)
    }

    /// Claims of a valid, unexpired access token.
    pub fn decode_access(&self, token: &str) -> Result<Claims, TokenError>{
        let claims = self.decode_key(token).ok_or(TokenError::Invalid)?;

        match claims.token_type {
            TokenType::Access => Ok(claims),
            TokenType::Refresh => Err(TokenError::WrongType)
        }
    }

    pub fn decode_key(&self, token: &str) -> Option<Claims>{
        match jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &Validation::new(Algorithm::HS256)
        ) {
            Ok(decoded_data) => Some(decoded_data.claims),
            Err(e) => {
                tracing::debug!("Rejected token: {}", e);
                None
            }
        }
    }

    fn sign(
        &self,
        sub: Uuid,
        username: &str,
        email: &str,
        role: UserRole,
        token_type: TokenType
    ) -> Result<String, TokenError>{
        let now = Utc::now();
        let lifetime = match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::Refresh => self.refresh_lifetime
        };

        let claims = Claims{
            sub,
            username: username.to_string(),
            email: email.to_string(),
            role,
            token_type,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: Uuid::new_v4()
        };

        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes())
        )?)
    }
}
