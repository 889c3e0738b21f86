pub mod error;
pub mod host;
pub mod runtime;
pub mod types;

pub use error::JsError;
pub use runtime::{Runtime, RuntimeFeatures};
pub use types::JsValue;
