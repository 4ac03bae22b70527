pub use super::audit_log::Entity as AuditLog;
pub use super::refresh_token::Entity as RefreshToken;
pub use super::task::Entity as Task;
pub use super::user::Entity as User;
