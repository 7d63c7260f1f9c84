//! `castellan-infra` — concrete implementations of the engine's capabilities.
//!
//! In-memory stores (dev/test default), the HS256 token service, the Argon2
//! password vault, and startup seeding of the built-in catalog and system
//! roles.

pub mod bootstrap;
pub mod memory;
pub mod password;
pub mod token;

pub use bootstrap::{SeededRoles, seed};
pub use memory::{InMemoryPermissionStore, InMemoryRoleStore, InMemoryUserStore};
pub use password::Argon2Vault;
pub use token::HsTokenService;
