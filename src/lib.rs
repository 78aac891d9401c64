pub mod auth;
pub mod config;
pub mod course;
pub mod domain;
pub mod error;
pub mod grade;
pub mod mail;

pub use error::{Error, Result};
