pub mod records;
pub mod sandbox;
pub mod schema;
