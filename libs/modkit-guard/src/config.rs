use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use modkit_ability::{AbilityAggregator, AbilityConfig, Principal, TenantMembership};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config_error::ConfigError;
use crate::guard::Guard;
use crate::providers::{JwtCredentialResolver, StaticCredentialResolver, StaticMembershipLoader};
use crate::traits::CredentialResolver;

/// Environment prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "AUTHZ_";

/// Guard configuration
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Header carrying the credential
    pub credential_header: String,

    /// Scheme prefix stripped from the header value
    pub credential_scheme: String,

    /// Verify bearer tokens as HS256 JWTs. Static credentials are used
    /// when absent; setting both is rejected.
    pub jwt: Option<JwtConfig>,

    /// Token -> principal, for development and tests
    pub static_credentials: BTreeMap<String, Principal>,

    /// Principal id -> memberships
    pub static_memberships: BTreeMap<String, Vec<TenantMembership>>,

    pub ability: AbilityConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            credential_header: "Authorization".to_owned(),
            credential_scheme: "Bearer".to_owned(),
            jwt: None,
            static_credentials: BTreeMap::new(),
            static_memberships: BTreeMap::new(),
            ability: AbilityConfig::default(),
        }
    }
}

/// HS256 token verification settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JwtConfig {
    pub secret: SecretString,

    /// Expected `iss`; any issuer is accepted when unset
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected `aud`; not checked when unset
    #[serde(default)]
    pub audience: Option<String>,

    /// Leeway in seconds for `exp` and `nbf`
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,

    /// Claim holding the principal's platform roles
    #[serde(default = "default_roles_claim")]
    pub roles_claim: String,
}

fn default_leeway() -> u64 {
    60
}

fn default_roles_claim() -> String {
    "roles".to_owned()
}

impl GuardConfig {
    /// Extract and validate configuration from a prepared figment.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional YAML file, then `AUTHZ_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Validate the configuration for consistency
    ///
    /// # Errors
    ///
    /// Returns an error on an empty or invalid header name, an empty JWT
    /// secret, JWT settings alongside static credentials, or an invalid
    /// ability configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credential_header.trim().is_empty() {
            return Err(ConfigError::EmptyValue("credential_header"));
        }
        http::HeaderName::try_from(self.credential_header.as_str())
            .map_err(|_| ConfigError::InvalidHeader(self.credential_header.clone()))?;
        if let Some(jwt) = &self.jwt {
            if jwt.secret.expose_secret().is_empty() {
                return Err(ConfigError::EmptyValue("jwt.secret"));
            }
            if jwt.roles_claim.is_empty() {
                return Err(ConfigError::EmptyValue("jwt.roles_claim"));
            }
            if !self.static_credentials.is_empty() {
                return Err(ConfigError::Conflict("jwt", "static_credentials"));
            }
        }
        self.ability.validate()?;
        Ok(())
    }

    /// Build a [`Guard`] backed by the configured providers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build_guard(&self) -> Result<Guard, ConfigError> {
        self.validate()?;

        let credentials: Arc<dyn CredentialResolver> = match &self.jwt {
            Some(jwt) => Arc::new(JwtCredentialResolver::new(jwt)),
            None => Arc::new(StaticCredentialResolver::from_map(
                self.static_credentials.clone(),
            )),
        };
        let memberships = StaticMembershipLoader::from_map(self.static_memberships.clone());
        let aggregator = AbilityAggregator::from_config(&self.ability)?;

        tracing::debug!(
            jwt = self.jwt.is_some(),
            static_credentials = self.static_credentials.len(),
            "guard configured"
        );

        Ok(Guard::new(credentials, Arc::new(memberships), Arc::new(aggregator)))
    }
}
