pub mod gateway;
pub mod health;
pub mod messaging;
pub mod shares;
