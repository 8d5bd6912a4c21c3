use crate::adapters::{ReqwestTransport, SubscriptionStore, SystemTimeProvider};
use crate::config::AppConfig;
use crate::push::PushService;

pub type DefaultPushService = PushService<SubscriptionStore, ReqwestTransport, SystemTimeProvider>;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub push: DefaultPushService,
}

impl AppState {
    pub fn new(config: AppConfig, store: SubscriptionStore) -> Result<Self, reqwest::Error> {
        let transport = ReqwestTransport::new(config.delivery.send_timeout)?;
        Ok(Self {
            push: PushService::new(store, transport, SystemTimeProvider),
            config,
        })
    }
}
