pub mod config;
pub mod domain;
pub mod engine;
pub mod input;
pub mod model;
pub mod output;
pub mod results;
pub mod server;
pub mod solver;
