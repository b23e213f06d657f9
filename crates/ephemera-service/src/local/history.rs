//! In-process bounded history.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use ephemera_core::{DomainResult, HistoryStore, Message};

/// Newest-first message log per channel
#[derive(Debug)]
pub struct LocalHistory {
    logs: DashMap<String, VecDeque<Message>>,
    max_messages: usize,
}

impl LocalHistory {
    #[must_use]
    pub fn new(max_messages: usize) -> Self {
        Self {
            logs: DashMap::new(),
            max_messages: max_messages.max(1),
        }
    }

    /// Messages currently retained for a channel
    pub fn len(&self, channel: &str) -> usize {
        self.logs.get(channel).map_or(0, |log| log.len())
    }
}

#[async_trait]
impl HistoryStore for LocalHistory {
    async fn append(&self, channel: &str, message: &Message) -> DomainResult<()> {
        let mut log = self.logs.entry(channel.to_string()).or_default();
        log.push_front(message.clone());
        log.truncate(self.max_messages);
        Ok(())
    }

    async fn range(&self, channel: &str, start: usize, limit: usize) -> DomainResult<Vec<Message>> {
        Ok(self
            .logs
            .get(channel)
            .map(|log| log.iter().skip(start).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, channel: &str) -> DomainResult<()> {
        self.logs.remove(channel);
        Ok(())
    }
}
