use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;

/// 访问令牌声明
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: String,
    pub email: String,
    pub tenant_id: String,
    pub session_id: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// HS256 访问令牌的签发与校验。校验不做任何 I/O，只检查签名和 `exp`
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenVerifier {
    pub fn new(secret: &str, lifetime: std::time::Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime: Duration::seconds(lifetime.as_secs() as i64),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.jwt_expiration())
    }

    /// 签发绑定 `session_id` 的令牌，返回令牌及其过期时间（unix 时间戳）
    pub fn issue(
        &self,
        user_id: &str,
        email: &str,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<(String, i64), AppError> {
        let now = Utc::now();
        let claims = AccessClaims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            tenant_id: tenant_id.to_string(),
            session_id: session_id.to_string(),
            issued_at: now.timestamp(),
            expires_at: (now + self.lifetime).timestamp(),
        };
        self.sign(&claims).map(|token| (token, claims.expires_at))
    }

    pub fn sign(&self, claims: &AccessClaims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<AccessClaims, AppError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => {
                    tracing::debug!("Rejected token: {}", e);
                    AppError::TokenInvalid
                }
            })
    }
}
