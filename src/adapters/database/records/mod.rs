pub mod message;
pub mod post;
pub mod user;

pub use message::MessageRecord;
pub use post::SharedPostRecord;
pub use user::UserProfileRecord;
