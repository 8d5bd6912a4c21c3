use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SUBJECT: &str = "mailto:admin@localhost";
pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);
/// Seconds a push service should hold an undelivered message.
pub const DEFAULT_TTL: u32 = 86_400;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub vapid: VapidConfig,
    pub delivery: DeliverySettings,
    pub notification: NotificationDefaults,
    pub subscriptions: Option<PathBuf>,
    /// When set, `/api/notify` requires `Authorization: Bearer <token>`.
    pub api_token: Option<ApiToken>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    /// Blank tokens are treated as unset.
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

#[derive(Clone)]
pub struct VapidConfig {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub subject: String,
}

impl std::fmt::Debug for VapidConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("subject", &self.subject)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub concurrency: usize,
    pub send_timeout: Duration,
    pub ttl: u32,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            ttl: DEFAULT_TTL,
        }
    }
}

/// Fields added to every notification payload.
#[derive(Debug, Clone, Default)]
pub struct NotificationDefaults {
    pub icon: Option<String>,
    pub badge: Option<String>,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vapid: VapidConfig {
                public_key: None,
                private_key: None,
                subject: DEFAULT_SUBJECT.to_string(),
            },
            delivery: DeliverySettings::default(),
            notification: NotificationDefaults::default(),
            subscriptions: None,
            api_token: None,
        }
    }
}
