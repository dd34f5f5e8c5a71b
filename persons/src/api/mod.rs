pub mod endpoint;
pub mod errors;
