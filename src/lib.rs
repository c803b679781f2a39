pub mod capture;
pub mod chrome;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod host;
pub mod js_templates;
pub mod output;
pub mod rules;
pub mod server;
pub mod snapshot;
pub mod store;

pub use codec::{BodyCodec, CodecRegistry, registry};
pub use config::Config;
pub use error::EditorError;
pub use store::{SessionStore, TabId};

pub type Result<T> = std::result::Result<T, EditorError>;
