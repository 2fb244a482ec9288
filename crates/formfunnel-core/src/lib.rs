pub mod catalog;
pub mod datatype;
pub mod error;
pub mod parser;
pub mod types;

pub use catalog::{Catalog, TableSchema, DEFAULT_PROTECTED};
pub use datatype::ExpectedType;
pub use error::FormFunnelError;
pub use parser::parse_request_data;
pub use types::{ColumnSchema, ParsedRow, Payload, Slot};
