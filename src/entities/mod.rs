pub mod logo;
pub mod user;
