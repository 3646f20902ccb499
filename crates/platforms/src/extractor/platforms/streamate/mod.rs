mod builder;
mod models;

pub use builder::{Streamate, StreamateEndpoints};
