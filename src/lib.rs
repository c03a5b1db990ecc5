#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod error;
pub mod models;
pub mod payload;
pub mod schema;
pub mod seed;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::Error;
pub use models::Message;
pub use service::MessageService;
pub use store::{Store, StoreError};
