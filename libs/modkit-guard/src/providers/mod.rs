//! Built-in credential and membership providers.

pub mod jwt;
pub mod static_credentials;
pub mod static_memberships;

pub use jwt::JwtCredentialResolver;
pub use static_credentials::StaticCredentialResolver;
pub use static_memberships::StaticMembershipLoader;
