use std::sync::Arc;
use crate::domain::{
    models::{auth::{Claims, RefreshTokenRecord, TOKEN_AUDIENCE}, user::{Actor, User}},
    ports::{AuthRepository, UserRepository},
};
use crate::error::AppError;
use crate::config::Config;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;
use chrono::{Utc, Duration};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Sha256, Digest};
use tracing::{error, warn};

pub const ACCESS_TOKEN_MINUTES: i64 = 15;
pub const REFRESH_TOKEN_DAYS: i64 = 7;

/// Credentials handed to the client after login or refresh.
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub csrf_token: String,
}

/// The verified identity carried by an access token.
pub struct VerifiedToken {
    pub actor: Actor,
    pub csrf_token: String,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    repo: Arc<dyn AuthRepository>,
    config: Config,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, repo: Arc<dyn AuthRepository>, config: Config) -> Self {
        let encoding_key = EncodingKey::from_ed_pem(config.jwt_secret_key.as_bytes())
            .expect("Invalid JWT Private Key PEM");
        let decoding_key = DecodingKey::from_ed_pem(config.jwt_public_key.as_bytes())
            .expect("Invalid JWT Public Key PEM");

        Self { users, repo, config, encoding_key, decoding_key }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Password hashing failed: {}", e);
                AppError::Internal
            })
    }

    /// Checks username and password. Unknown users and wrong passwords are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        let user = self.users.find_by_username(username).await?
            .ok_or(AppError::Unauthorized)?;

        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal)?;

        Argon2::default().verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AppError::Unauthorized)?;

        Ok(user)
    }

    pub async fn login(&self, user: &User) -> Result<IssuedTokens, AppError> {
        let family_id = Uuid::new_v4();
        let (tokens, record) = self.mint(user, family_id, 1)?;
        self.repo.create_refresh_token(&record).await?;
        Ok(tokens)
    }

    /// Trades a refresh token for a new pair and burns the presented one.
    /// Losing a concurrent rotation of the same token revokes its family.
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<(User, IssuedTokens), AppError> {
        let token_hash = hash_token(raw_refresh_token);

        let record = self.repo.find_refresh_token(&token_hash).await?
            .ok_or(AppError::Unauthorized)?;

        if record.expires_at < Utc::now() {
            self.repo.delete_refresh_token(&token_hash).await?;
            return Err(AppError::Unauthorized);
        }

        // Role may have changed since the last token; always reload it.
        let user = self.users.find_by_id(&record.user_id).await?
            .ok_or(AppError::Unauthorized)?;

        let (tokens, next) = self.mint(&user, record.family_id, record.generation_id + 1)?;
        if !self.repo.rotate_refresh_token(&token_hash, &next).await? {
            warn!(user_id = %user.id, family_id = %record.family_id, "Refresh token reused; revoking family");
            self.repo.delete_refresh_family(record.family_id).await?;
            return Err(AppError::Unauthorized);
        }

        Ok((user, tokens))
    }

    pub async fn logout(&self, raw_refresh_token: &str) -> Result<(), AppError> {
        let token_hash = hash_token(raw_refresh_token);
        match self.repo.find_refresh_token(&token_hash).await? {
            Some(record) => self.repo.delete_refresh_family(record.family_id).await,
            None => Ok(()),
        }
    }

    fn verify_access_token(&self, token: &str) -> Result<VerifiedToken, AppError> {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_issuer(&[self.config.auth_issuer.as_str()]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::Unauthorized)?;

        Ok(VerifiedToken {
            actor: Actor::new(data.claims.sub, data.claims.role),
            csrf_token: data.claims.csrf_token,
        })
    }

    /// Verifies the access token, then takes the caller's role from the store
    /// so a role change applies from the next request rather than the next
    /// token. A deleted user is unauthenticated.
    pub async fn resolve_access_token(&self, token: &str) -> Result<VerifiedToken, AppError> {
        let mut verified = self.verify_access_token(token)?;
        let user = self.users.find_by_id(&verified.actor.id).await?
            .ok_or(AppError::Unauthorized)?;
        verified.actor = Actor::new(user.id, user.role);
        Ok(verified)
    }

    fn mint(&self, user: &User, family_id: Uuid, generation_id: i32) -> Result<(IssuedTokens, RefreshTokenRecord), AppError> {
        let csrf_token = random_token(32);
        let now = Utc::now();
        let exp = (now + Duration::minutes(ACCESS_TOKEN_MINUTES)).timestamp() as usize;

        let claims = Claims {
            iss: self.config.auth_issuer.clone(),
            sub: user.id.clone(),
            aud: TOKEN_AUDIENCE.to_string(),
            exp,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            role: user.role,
            csrf_token: csrf_token.clone(),
        };

        let access_token = encode(&Header::new(Algorithm::EdDSA), &claims, &self.encoding_key)
            .map_err(|e| {
                error!("JWT encoding failed: {}", e);
                AppError::Internal
            })?;

        let refresh_token = random_token(64);
        let record = RefreshTokenRecord {
            token_hash: hash_token(&refresh_token),
            user_id: user.id.clone(),
            family_id,
            generation_id,
            expires_at: now + Duration::days(REFRESH_TOKEN_DAYS),
            created_at: now,
        };

        Ok((IssuedTokens { access_token, refresh_token, csrf_token }, record))
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
