pub mod activity;
pub mod user;

pub use activity::*;
pub use user::*;
