pub mod reader;
pub mod schema;
pub mod types;

pub use reader::ArrowIpcReader;
pub use schema::SchemaMirror;
pub use types::LogicalType;
