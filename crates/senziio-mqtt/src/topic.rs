//! Topic filter matching and callback routing

use crate::error::{TransportError, TransportResult};
use crate::message::MqttMessage;
use crate::transport::MessageCallback;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Check whether a concrete topic matches an MQTT topic filter
///
/// `+` matches exactly one level and `#` matches all remaining levels,
/// including the parent level itself (`a/#` matches `a`). Topics starting
/// with `$` are never matched by a filter that starts with a wildcard.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Validate a topic filter before subscribing to it
pub fn validate_filter(filter: &str) -> TransportResult<()> {
    let invalid = |reason: &str| TransportError::InvalidTopic {
        topic: filter.to_string(),
        reason: reason.to_string(),
    };

    if filter.is_empty() {
        return Err(invalid("topic filter cannot be empty"));
    }

    let levels: Vec<&str> = filter.split('/').collect();
    for (index, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || index != levels.len() - 1) {
            return Err(invalid("'#' must occupy the last level on its own"));
        }
        if level.contains('+') && *level != "+" {
            return Err(invalid("'+' must occupy a whole level"));
        }
    }

    Ok(())
}

/// A unique identifier for a registered route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(u64);

struct Route {
    filter: String,
    callback: MessageCallback,
}

/// Routes incoming messages to the callbacks whose filters match them
pub struct TopicRouter {
    routes: DashMap<RouteId, Route>,
    next_route_id: AtomicU64,
}

impl TopicRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
            next_route_id: AtomicU64::new(1),
        }
    }

    /// Register a callback for a topic filter
    pub fn add(&self, filter: impl Into<String>, callback: MessageCallback) -> RouteId {
        let id = RouteId(self.next_route_id.fetch_add(1, Ordering::SeqCst));
        let filter = filter.into();
        trace!(filter = %filter, route = id.0, "Adding route");
        self.routes.insert(id, Route { filter, callback });
        id
    }

    /// Remove a route, returning its filter if it was still registered
    pub fn remove(&self, id: RouteId) -> Option<String> {
        self.routes.remove(&id).map(|(_, route)| {
            trace!(filter = %route.filter, route = id.0, "Removed route");
            route.filter
        })
    }

    /// Whether any route is registered for exactly this filter
    pub fn has_filter(&self, filter: &str) -> bool {
        self.routes.iter().any(|entry| entry.filter == filter)
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Deliver a message to every matching route, returning how many matched
    pub fn dispatch(&self, message: &MqttMessage) -> usize {
        // Collect first so no map shard is locked while callbacks run
        let callbacks: Vec<MessageCallback> = self
            .routes
            .iter()
            .filter(|entry| topic_matches(&entry.filter, &message.topic))
            .map(|entry| entry.callback.clone())
            .collect();

        trace!(topic = %message.topic, matched = callbacks.len(), "Dispatching message");

        for callback in &callbacks {
            callback(message.clone());
        }
        callbacks.len()
    }
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self::new()
    }
}
