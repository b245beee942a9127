use std::collections::BTreeMap;
use std::sync::Arc;

use cohort_core::errors::RoundError;
use cohort_core::events::{TOPIC_ERROR, TOPIC_ROUND_CLOSED, TOPIC_ROUND_CREATED, TOPIC_ROUND_PROGRESS};

use crate::handlers::{Handler, ProgressHandler, RoundClosedHandler};
use crate::tabular::TabularLog;

/// Topic to handler lookup.
#[derive(Default, Clone)]
pub struct Mapper {
    handlers: BTreeMap<String, Arc<dyn Handler>>,
}

impl Mapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed rounds get their own sheet; every other topic goes to the
    /// progress sheet.
    #[must_use]
    pub fn standard(log: Arc<dyn TabularLog>) -> Self {
        let progress: Arc<dyn Handler> = Arc::new(ProgressHandler::new(Arc::clone(&log)));
        let mut mapper = Self::new();
        mapper.register(TOPIC_ROUND_CLOSED, Arc::new(RoundClosedHandler::new(log)));
        mapper.register(TOPIC_ROUND_CREATED, Arc::clone(&progress));
        mapper.register(TOPIC_ROUND_PROGRESS, Arc::clone(&progress));
        mapper.register(TOPIC_ERROR, progress);
        mapper
    }

    pub fn register(&mut self, topic: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(topic.into(), handler);
    }

    /// # Errors
    ///
    /// `UnknownEventTopic` when no handler is registered for `topic`.
    pub fn handler(&self, topic: &str) -> Result<Arc<dyn Handler>, RoundError> {
        self.handlers
            .get(topic)
            .cloned()
            .ok_or_else(|| RoundError::UnknownEventTopic(topic.to_string()))
    }

    /// Registered topics, sorted.
    pub fn topics(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::MemoryTabularLog;
    use pretty_assertions::assert_eq;

    #[test]
    fn standard_mapper_covers_all_topics() {
        let mapper = Mapper::standard(Arc::new(MemoryTabularLog::new()));
        assert_eq!(
            mapper.topics(),
            vec![
                "study.error",
                "study.round-closed",
                "study.round-created",
                "study.round-progress",
            ]
        );
    }

    #[test]
    fn unknown_topic_is_an_error() {
        let mapper = Mapper::new();
        assert_eq!(
            mapper.handler("study.unknown").err(),
            Some(RoundError::UnknownEventTopic("study.unknown".into()))
        );
    }
}
