//! Subscription options.

/// Options for [`Subscription::open`](crate::Subscription::open).
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    pub(crate) presence: bool,
    pub(crate) member_id: Option<String>,
    pub(crate) member_meta: Option<serde_json::Value>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable presence, announcing this member on the topic roster.
    pub fn presence(mut self, member_id: impl Into<String>) -> Self {
        self.presence = true;
        self.member_id = Some(member_id.into());
        self
    }

    /// Attach metadata to the presence announcement. Only meaningful
    /// together with [`presence`](Self::presence).
    pub fn member_meta(mut self, meta: serde_json::Value) -> Self {
        self.member_meta = Some(meta);
        self
    }
}
