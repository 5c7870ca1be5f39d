pub mod arena;
pub mod arena_config;
pub mod errors;
pub mod logging;
pub mod rating;
pub mod schema;
