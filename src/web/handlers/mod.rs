pub mod conf;
pub mod entries;
pub mod login;
