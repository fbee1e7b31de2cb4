//! Trace context carried across the broker in message metadata.
//!
//! The publisher injects its current span context into [`MessageHeaders`];
//! the consumer extracts it and parents its own span on it. This is the only
//! link between the two sides of the asynchronous hop.

use std::collections::BTreeMap;

use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::{Context, global};
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// String key/value metadata attached to a message.
///
/// Transport independent: broker adapters convert their native header
/// tables to and from this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders(BTreeMap<String, String>);

impl MessageHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for MessageHeaders {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Injector for MessageHeaders {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key, value);
    }
}

impl Extractor for MessageHeaders {
    fn get(&self, key: &str) -> Option<&str> {
        MessageHeaders::get(self, key)
    }

    fn keys(&self) -> Vec<&str> {
        MessageHeaders::keys(self).collect()
    }
}

/// Installs the W3C trace-context propagator as the process-wide propagator.
///
/// Until this runs, [`inject_context`] writes nothing and [`extract_context`]
/// finds nothing.
pub fn init_propagator() {
    global::set_text_map_propagator(TraceContextPropagator::new());
}

/// Writes the span context of `cx` into `headers` using the global propagator.
pub fn inject_context(cx: &Context, headers: &mut MessageHeaders) {
    global::get_text_map_propagator(|propagator| propagator.inject_context(cx, headers));
}

/// Builds a parent context from inbound headers using the global propagator.
///
/// Headers without a valid `traceparent` yield a context with no span.
pub fn extract_context(headers: &MessageHeaders) -> Context {
    global::get_text_map_propagator(|propagator| {
        propagator.extract_with_context(&Context::new(), headers)
    })
}
