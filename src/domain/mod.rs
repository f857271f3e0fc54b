pub mod auth;
pub mod conversation;
pub mod message;
pub mod notification;
pub mod post;
pub mod user;
