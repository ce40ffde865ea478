/// Signed, typed, expiring tokens with unique JTIs
///
/// Two token kinds exist: `register` (issued at registration, accepted only
/// by the OTP endpoints) and `access` (issued at login, accepted by every
/// protected route). The JTI is the key into the revocation ledger and the
/// session registry; the claims themselves are stateless.
///
/// Keys live inside [`TokenIssuer`] and are injected at startup. There is
/// no process-global key storage, and the service refuses to start without
/// a signing secret.
use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token kind, embedded in the claims and checked by every consumer.
///
/// Type confusion (a registration token presented to a protected route, or
/// vice versa) is a distinct failure from an invalid signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Register,
}

/// Strongly typed claims, validated at parse time.
///
/// Missing required fields fail the parse; there is no dynamic claim map
/// to type-assert against later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub jti: String,
    pub user_id: i64,
    pub user_uuid: Uuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// A freshly minted token plus the metadata callers record out-of-band.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 token issuer/parser around a process-wide signing secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    registration_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_secs: i64, registration_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            registration_ttl: Duration::seconds(registration_ttl_secs),
        }
    }

    /// Mint an access token carrying the user's role names.
    ///
    /// Pure over its inputs; recording the JTI in the session registry is
    /// the caller's job.
    pub fn issue_access(
        &self,
        user_id: i64,
        user_uuid: Uuid,
        roles: Vec<String>,
    ) -> Result<IssuedToken> {
        self.issue(TokenType::Access, user_id, user_uuid, roles, self.access_ttl)
    }

    /// Mint a registration token, valid only for the OTP endpoints.
    pub fn issue_registration(&self, user_id: i64, user_uuid: Uuid) -> Result<IssuedToken> {
        self.issue(
            TokenType::Register,
            user_id,
            user_uuid,
            Vec::new(),
            self.registration_ttl,
        )
    }

    fn issue(
        &self,
        token_type: TokenType,
        user_id: i64,
        user_uuid: Uuid,
        roles: Vec<String>,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            jti: jti.clone(),
            user_id,
            user_uuid,
            roles,
            token_type,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Verify signature and temporal claims and return the typed claims.
    ///
    /// Expired tokens map to `TokenExpired`, everything else (bad signature,
    /// malformed or missing claims, wrong algorithm) to `InvalidToken`.
    /// Checking `token_type` against the endpoint's expectation is the
    /// caller's contract.
    pub fn parse(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
