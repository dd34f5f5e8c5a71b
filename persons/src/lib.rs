pub mod api;
pub mod config;
pub mod persons;
pub mod router;
pub mod seed;
pub mod server;
pub mod test_utils;
