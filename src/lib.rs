pub mod constants;
pub mod engine;
pub mod error;
pub mod input_protocol;
pub mod movement;
pub mod rng;
pub mod save_store;
pub mod types;
pub mod viewport;
pub mod world;
