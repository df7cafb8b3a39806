pub mod auth_jwt_claims;
pub mod authenticated_user;
pub mod recipient;

pub use auth_jwt_claims::Claims;
pub use authenticated_user::AuthenticatedUser;
pub use recipient::{NotificationKind, NotificationRecipient, RecipientKind};
