pub mod grade;
pub mod mail;
