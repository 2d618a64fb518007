pub mod error;
pub mod source;
pub mod table;
pub mod types;
