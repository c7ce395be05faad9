pub mod api_keys;
pub mod health;
pub mod remove;
pub mod users;
