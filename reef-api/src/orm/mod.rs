mod db;
pub mod login;
pub mod logout;
pub mod reading;
pub mod role;
pub mod testing;
pub mod user;
pub mod user_role;

pub use db::*;
