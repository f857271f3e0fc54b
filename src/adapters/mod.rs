pub mod database;
pub mod redis;
