pub mod admin;
pub mod auth;
pub mod favorites;
pub mod orders;
pub mod products;
