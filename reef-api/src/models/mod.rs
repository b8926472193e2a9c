pub mod reading;
pub mod role;
pub mod session;
pub mod user;
pub mod user_role;

// Re-export models for easier access
pub use reading::*;
pub use role::*;
pub use session::*;
pub use user::*;
pub use user_role::*;
