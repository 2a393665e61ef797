use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use modkit_ability::Principal;
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::config::JwtConfig;
use crate::traits::{CredentialError, CredentialResolver};

/// Verifies HS256 bearer tokens and maps their claims to a [`Principal`].
///
/// `sub` becomes the principal id; the configured roles claim may hold a
/// string or an array of strings.
pub struct JwtCredentialResolver {
    key: DecodingKey,
    validation: Validation,
    roles_claim: String,
}

impl std::fmt::Debug for JwtCredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCredentialResolver")
            .field("roles_claim", &self.roles_claim)
            .finish_non_exhaustive()
    }
}

impl JwtCredentialResolver {
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let key = DecodingKey::from_secret(config.secret.expose_secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key,
            validation,
            roles_claim: config.roles_claim.clone(),
        }
    }

    fn principal_from_claims(&self, claims: &Value) -> Result<Principal, CredentialError> {
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CredentialError::Malformed("`sub` must be a non-empty string".to_owned())
            })?;

        let roles = match claims.get(&self.roles_claim) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(role)) => vec![role.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        CredentialError::Malformed(format!(
                            "`{}` must contain only strings",
                            self.roles_claim
                        ))
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(CredentialError::Malformed(format!(
                    "`{}` must be a string or an array",
                    self.roles_claim
                )));
            }
        };

        Ok(Principal::new(subject).with_roles(roles))
    }
}

#[async_trait]
impl CredentialResolver for JwtCredentialResolver {
    async fn resolve(&self, raw_token: &str) -> Result<Principal, CredentialError> {
        let data = decode::<Value>(raw_token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => CredentialError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::ImmatureSignature
                | ErrorKind::InvalidAlgorithm => CredentialError::Rejected(e.to_string()),
                _ => CredentialError::Malformed(e.to_string()),
            }
        })?;

        self.principal_from_claims(&data.claims)
    }
}
