pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod range;
pub mod rest;
pub mod store;

pub use config::Config;
pub use engine::{Assignment, CreateSubnetRequest, CreatedSubnet, Engine};
pub use error::{Error, ErrorKind, Result};
pub use store::Store;
