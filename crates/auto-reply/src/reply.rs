use {
    tracing::{debug, info},
    wagate_common::types::InboundMessage,
    wagate_config::{AutoReplyConfig, AutoReplyRule},
};

/// Ordered exact-match reply rules.
#[derive(Debug, Clone, Default)]
pub struct AutoReplyRules {
    rules: Vec<AutoReplyRule>,
}

impl AutoReplyRules {
    pub fn new(rules: Vec<AutoReplyRule>) -> Self {
        Self { rules }
    }

    /// Rules from config; a disabled section yields no rules.
    pub fn from_config(config: &AutoReplyConfig) -> Self {
        if config.enabled {
            Self::new(config.rules.clone())
        } else {
            Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Reply text for `msg`, if any rule matches its body exactly.
    ///
    /// Messages sent by the account itself never match.
    pub fn reply_for(&self, msg: &InboundMessage) -> Option<&str> {
        if msg.from_me {
            return None;
        }
        let rule = self.rules.iter().find(|r| r.trigger == msg.body);
        match rule {
            Some(rule) => {
                info!(from = %msg.from, trigger = %rule.trigger, "auto-reply matched");
                Some(rule.reply.as_str())
            },
            None => {
                debug!(from = %msg.from, "no auto-reply rule matched");
                None
            },
        }
    }
}
