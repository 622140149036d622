pub mod app_user;
pub mod common;
pub mod user_group;

pub use app_user::*;
pub use common::*;
pub use user_group::*;
