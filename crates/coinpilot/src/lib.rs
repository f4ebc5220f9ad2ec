pub mod agent;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod providers;
pub mod systems;
