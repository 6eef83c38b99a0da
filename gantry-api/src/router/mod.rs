pub mod admin;
pub mod health;
pub mod proxy;
#[allow(clippy::module_inception)]
pub mod router;
