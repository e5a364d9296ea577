//! `promostock-auth`: token validation and permission checks.
//!
//! No HTTP or storage here. The API derives a [`Principal`] from validated
//! [`JwtClaims`] and checks one [`Permission`] per mutation.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::{Principal, TenantMembership};
pub use roles::{Role, permissions_for_roles};
