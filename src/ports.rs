pub mod push;
pub mod repository;
pub mod time;

pub use push::{PushRequest, PushResponse, PushTransport};
pub use repository::SubscriptionRepository;
pub use time::TimeProvider;
