//! JWT 凭证验证
//!
//! HS256 令牌，载荷为 `{userId, username, email, exp}`，与认证服务签发的格式一致。

use async_trait::async_trait;
use chrono::{Duration, Utc};
use config::JwtConfig;
use domain::{AuthError, CredentialVerifier, Identity, UserId};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// JWT Claims 结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT 凭证验证器
#[derive(Clone)]
pub struct JwtCredentialVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCredentialVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// 为身份签发令牌，测试和本地工具使用
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            user_id: identity.id.to_string(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            exp: (Utc::now() + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Unavailable(format!("token generation failed: {err}")))
    }

    /// 验证并解析令牌
    pub fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(err.to_string()),
            })
    }
}

#[async_trait]
impl CredentialVerifier for JwtCredentialVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let token = credential.trim();
        let token = match token.strip_prefix("Bearer") {
            Some(rest) if rest.is_empty() || rest.starts_with(' ') => rest.trim(),
            _ => token,
        };
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let claims = self.decode_claims(token)?;
        let user_id =
            UserId::parse(claims.user_id).map_err(|err| AuthError::InvalidToken(err.to_string()))?;
        debug!(user_id = %user_id, "Credential verified");

        Ok(Identity::new(user_id, claims.username, claims.email))
    }
}
