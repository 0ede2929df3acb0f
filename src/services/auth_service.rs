//! Authorization service
//!
//! Turns a credential into an `Identity`. Stateless; the actual check is
//! delegated to a `CredentialVerifier` chosen by `[auth].verifier`.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, trace};

use crate::capability::payloads::{AuthorizeRequest, Identity};
use crate::capability::{Capability, CapabilityRegistryBuilder, service_handler};
use crate::config::{AuthConfig, CredentialEntry, VerifierKind};
use crate::dispatch::Dispatcher;
use crate::errors::{MorphlinkError, Result};
use crate::metrics_core::{MetricsRecorder, NoopMetrics};

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity>;

    /// Label used in logs and metrics
    fn name(&self) -> &'static str;
}

/// Fixed token table, compared in constant time
pub struct StaticCredentialVerifier {
    entries: Vec<CredentialEntry>,
}

impl StaticCredentialVerifier {
    pub fn new(entries: Vec<CredentialEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentialVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity> {
        // 遍历全部条目，不提前返回
        let mut matched: Option<&CredentialEntry> = None;
        for entry in &self.entries {
            let equal: bool = entry.token.as_bytes().ct_eq(credential.as_bytes()).into();
            if equal && matched.is_none() {
                matched = Some(entry);
            }
        }

        matched
            .map(|entry| Identity {
                user_id: entry.user_id.clone(),
                display_name: if entry.display_name.is_empty() {
                    entry.user_id.clone()
                } else {
                    entry.display_name.clone()
                },
            })
            .ok_or_else(|| MorphlinkError::unauthorized("invalid credential"))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Claims read from an HS256 token
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: i64,
}

pub struct JwtCredentialVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCredentialVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl CredentialVerifier for JwtCredentialVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity> {
        let data = decode::<CredentialClaims>(credential, &self.decoding_key, &self.validation)
            .map_err(|e| {
                trace!("JWT rejected: {}", e);
                MorphlinkError::unauthorized("invalid or expired token")
            })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(MorphlinkError::unauthorized("token has no subject"));
        }
        Ok(Identity {
            display_name: claims.name.unwrap_or_else(|| claims.sub.clone()),
            user_id: claims.sub,
        })
    }

    fn name(&self) -> &'static str {
        "jwt"
    }
}

pub struct AuthService {
    verifier: Arc<dyn CredentialVerifier>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl AuthService {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier,
            metrics: NoopMetrics::arc(),
        }
    }

    /// Build the verifier selected in `[auth]`
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let verifier: Arc<dyn CredentialVerifier> = match config.verifier {
            VerifierKind::Static => {
                Arc::new(StaticCredentialVerifier::new(config.credentials.clone()))
            }
            VerifierKind::Jwt => {
                let secret = config
                    .jwt_secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        MorphlinkError::invalid_request(
                            "auth.verifier = \"jwt\" requires auth.jwt_secret",
                        )
                    })?;
                Arc::new(JwtCredentialVerifier::new(secret))
            }
        };
        debug!("AuthService: using '{}' verifier", verifier.name());
        Ok(Self::new(verifier))
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn authorize(&self, credential: &str) -> Result<Identity> {
        let credential = credential.trim();
        if credential.is_empty() {
            self.metrics.inc_auth_failure(self.verifier.name());
            return Err(MorphlinkError::unauthorized("missing credential"));
        }

        match self.verifier.verify(credential).await {
            Ok(identity) => {
                trace!("Authorized user '{}'", identity.user_id);
                Ok(identity)
            }
            Err(e) => {
                self.metrics.inc_auth_failure(self.verifier.name());
                Err(e)
            }
        }
    }

    async fn authorize_capability(
        self: Arc<Self>,
        _ctx: Dispatcher,
        req: AuthorizeRequest,
    ) -> Result<Identity> {
        self.authorize(&req.credential).await
    }

    pub fn register(self: &Arc<Self>, builder: &mut CapabilityRegistryBuilder) {
        builder.register(
            Capability::Authorize,
            service_handler(self.clone(), Self::authorize_capability),
        );
    }
}

/// Resolve the caller through the `authorize` capability, wherever it runs
pub async fn authorize_via(ctx: &Dispatcher, credential: &str) -> Result<Identity> {
    ctx.call(
        Capability::Authorize,
        &AuthorizeRequest {
            credential: credential.to_string(),
        },
    )
    .await
}
