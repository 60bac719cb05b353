pub mod error;
pub mod types;
pub mod attribute;
pub mod schema;
pub mod serializer;
pub mod config;
pub mod retry;
pub mod expression;

pub use error::{Error, Result};
pub use types::*;
pub use attribute::{AttributeValue, NativeItem, NativeKey};
pub use schema::{Datatype, TableSchema};
pub use serializer::{Serializer, StandardSerializer};
pub use config::{BatchConfig, MAX_BATCH_GET_SIZE};
pub use retry::RetryPolicy;
