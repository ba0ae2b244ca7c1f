pub mod error;
pub mod identity;
pub mod media;
pub mod payment;
pub mod users;

pub use error::RepoError;
pub use identity::{Actor, PermissionError, Role};
pub use users::UserRepository;
