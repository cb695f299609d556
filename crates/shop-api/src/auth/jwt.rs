//! JWT Token 处理
//!
//! 提供 Token 的签发和验证。验证结果是显式的 `VerifyOutcome`，
//! 调用方按分支处理，不依赖错误类型的层级。

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use shop_shared::config::AuthConfig;

use crate::error::AuthError;

/// JWT Claims（Token 载荷）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID
    pub id: String,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
}

impl Claims {
    /// 剩余有效期（秒），已过期时为负数或零
    pub fn remaining_ttl_secs(&self) -> i64 {
        remaining_ttl_secs(self.exp)
    }
}

/// 距离 `exp` 的剩余秒数
pub fn remaining_ttl_secs(exp: i64) -> i64 {
    exp - Utc::now().timestamp()
}

/// Token 验证结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid(Claims),
    /// 已过期（无论签名是否正确）
    Expired,
    InvalidSignature,
    /// 结构、编码或载荷不合法
    Malformed,
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: i64,
}

impl JwtManager {
    /// 从认证配置创建，只支持 HMAC 系列算法
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let algorithm = match config.jwt_algorithm.to_ascii_uppercase().as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => {
                return Err(AuthError::Internal(format!("不支持的 JWT 算法: {}", other)));
            }
        };

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl_secs: config.token_ttl_secs,
        })
    }

    /// 签发 Token，有效期取配置值
    pub fn issue(&self, user_id: &str) -> Result<(String, Claims), AuthError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            id: user_id.to_string(),
            iat,
            exp: iat + self.token_ttl_secs,
        };
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }

    /// 按给定载荷签名
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("JWT 生成失败: {}", e)))
    }

    /// 验证签名和过期时间
    ///
    /// 过期判断没有宽限期，`exp` 所在的那一秒即视为过期。
    /// 签名错误的 Token 若已过期，同样报告为 `Expired`。
    pub fn verify(&self, token: &str) -> VerifyOutcome {
        match decode::<Claims>(token, &self.decoding_key, &self.validation()) {
            // 库只拒绝 exp < now；exp == now 时剩余有效期为 0，无法写入黑名单
            Ok(data) if data.claims.remaining_ttl_secs() <= 0 => VerifyOutcome::Expired,
            Ok(data) => VerifyOutcome::Valid(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => VerifyOutcome::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    if self.is_expired_unverified(token) {
                        VerifyOutcome::Expired
                    } else {
                        VerifyOutcome::InvalidSignature
                    }
                }
                _ => VerifyOutcome::Malformed,
            },
        }
    }

    pub fn token_ttl_secs(&self) -> i64 {
        self.token_ttl_secs
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }

    /// 不校验签名，只看载荷是否已过期
    fn is_expired_unverified(&self, token: &str) -> bool {
        let mut validation = self.validation();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        matches!(
            decode::<Claims>(token, &self.decoding_key, &validation),
            Ok(data) if data.claims.remaining_ttl_secs() <= 0
        )
    }
}
