// Node configuration

use crate::node::NodeError;
use crate::sync::DEFAULT_MAX_FRAME_LEN;
use crate::transport::{Topic, APP_TOPIC_NAME};
use serde::{Deserialize, Serialize};

/// Configuration for an auction node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Name the discovery topic is derived from
    pub topic_name: String,
    /// Largest frame accepted from or sent to a peer
    pub max_frame_length: usize,
    /// Events buffered per subscriber before slow subscribers start lagging
    pub event_capacity: usize,
    /// Frames queued per connection before the peer counts as too slow and is dropped
    pub outbound_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            topic_name: APP_TOPIC_NAME.to_string(),
            max_frame_length: DEFAULT_MAX_FRAME_LEN,
            event_capacity: 1024,
            outbound_capacity: 1024,
        }
    }
}

impl NodeConfig {
    /// Create a new config builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic_name(mut self, name: &str) -> Self {
        self.topic_name = name.to_string();
        self
    }

    pub fn with_max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Discovery topic for this node
    pub fn topic(&self) -> Topic {
        Topic::from_name(&self.topic_name)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.topic_name.is_empty() {
            return Err(NodeError::InvalidConfig("topic_name cannot be empty".to_string()));
        }
        if self.max_frame_length == 0 {
            return Err(NodeError::InvalidConfig("max_frame_length cannot be 0".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(NodeError::InvalidConfig("event_capacity cannot be 0".to_string()));
        }
        if self.outbound_capacity == 0 {
            return Err(NodeError::InvalidConfig("outbound_capacity cannot be 0".to_string()));
        }
        Ok(())
    }
}
