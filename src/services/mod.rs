pub mod conversation_service;
pub mod delivery;
pub mod gateway;
pub mod health_service;
pub mod message_service;
pub mod rate_limit_service;
pub mod read_state;
pub mod realtime_service;
pub mod share_service;
