pub mod aggregate;
pub mod parser;
pub mod report;
