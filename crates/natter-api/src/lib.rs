pub mod auth;
pub mod cities;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod password;
pub mod router;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
