//! MQTT topic filter parsing and matching.
//!
//! OpenChirp topics are slash-separated strings like
//! "openchirp/device/abc123/temperature". This module provides the filter
//! grammar the bridge subscribes with and utilities for matching topics
//! against filters that may include wildcards.
//!
//! Matching is segment-based without regex, the same scheme the broker
//! applies on its side of the subscription.

/// Subscription filter for device transducer telemetry: any device, any
/// transducer under the fixed namespace root.
pub const DEVICE_TELEMETRY_FILTER: &str = "openchirp/device/+/+";

/// A segment in a topic filter.
#[derive(Debug, Clone, PartialEq)]
enum FilterSegment {
    /// Exact literal match for this segment
    Literal(String),
    /// Single-level wildcard (+) - matches exactly one segment
    SingleLevel,
    /// Multi-level wildcard (#) - matches any remaining suffix, only valid
    /// as the final segment
    MultiLevel,
}

/// A topic filter that may contain wildcards.
///
/// Supported filters:
/// - Exact: "openchirp/device/abc123/temperature"
/// - Single-level wildcard: "openchirp/device/+/+"
/// - Multi-level wildcard: "openchirp/device/#"
/// - Full wildcard: "#"
///
/// Wildcards must occupy an entire segment ("dev+ice" is rejected) and `#`
/// is only accepted in the final position, per the usual MQTT filter rules.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    raw: String,
    segments: Vec<FilterSegment>,
}

impl TopicFilter {
    /// Parse a filter string.
    ///
    /// Filter syntax:
    /// - `+` matches exactly one topic level (e.g., "openchirp/device/+/+"
    ///   matches "openchirp/device/abc123/temperature")
    /// - `#` at the end matches any suffix, including none (e.g.,
    ///   "openchirp/#" matches "openchirp" and "openchirp/device/x/y")
    pub fn new(filter: &str) -> Result<Self, FilterError> {
        let raw = filter.to_string();
        let parts: Vec<&str> = filter.split('/').collect();

        // Check for empty filter
        if parts.is_empty() || (parts.len() == 1 && parts[0].is_empty()) {
            return Err(FilterError::EmptyFilter);
        }

        let mut segments = Vec::with_capacity(parts.len());
        for (i, &part) in parts.iter().enumerate() {
            let segment = match part {
                "+" => FilterSegment::SingleLevel,
                "#" => {
                    if i != parts.len() - 1 {
                        return Err(FilterError::MultiLevelNotLast);
                    }
                    FilterSegment::MultiLevel
                }
                _ => {
                    if part.contains('+') || part.contains('#') {
                        return Err(FilterError::EmbeddedWildcard(part.to_string()));
                    }
                    FilterSegment::Literal(part.to_string())
                }
            };
            segments.push(segment);
        }

        Ok(Self { raw, segments })
    }

    /// Check if a topic matches this filter.
    pub fn matches(&self, topic: &str) -> bool {
        let topic_parts: Vec<&str> = topic.split('/').collect();

        let mut pos = 0;
        for segment in &self.segments {
            match segment {
                // Always the final filter segment; matches the remaining
                // suffix including the empty one ("a/#" matches "a").
                FilterSegment::MultiLevel => return true,
                FilterSegment::SingleLevel => {
                    if pos >= topic_parts.len() {
                        return false;
                    }
                    pos += 1;
                }
                FilterSegment::Literal(lit) => {
                    if pos >= topic_parts.len() || topic_parts[pos] != lit {
                        return false;
                    }
                    pos += 1;
                }
            }
        }

        // Without a trailing '#' the topic must have exactly as many levels
        // as the filter.
        pos == topic_parts.len()
    }

    /// Get the raw filter string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Errors that can occur when parsing a topic filter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FilterError {
    #[error("Empty filter")]
    EmptyFilter,
    #[error("'#' is only valid as the final segment")]
    MultiLevelNotLast,
    #[error("Wildcard must occupy a whole segment: {0}")]
    EmbeddedWildcard(String),
}
