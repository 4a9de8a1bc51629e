pub mod claims;
pub mod dto;
pub mod guard;
pub mod monitor;
pub mod resolver;
pub mod services;
pub mod token_store;

#[cfg(test)]
pub(crate) mod testing;

pub use claims::UnverifiedClaims;
pub use dto::{Role, User};
pub use guard::GuardDecision;
pub use services::{SessionEvent, SessionService};
pub use token_store::{Session, TokenStore};
