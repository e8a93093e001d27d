//! Module log sink
//!
//! Modules log through their handle; the host adds the module header and
//! splits oversized messages before handing them to the [`LogSink`].

use std::fmt;
use strum_macros::EnumIter;

/// Severity of a module log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum Severity {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
}

impl Severity {
    pub fn level(&self) -> log::Level {
        match self {
            Severity::Trace => log::Level::Trace,
            Severity::Debug => log::Level::Debug,
            Severity::Information => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// Log target prefix used by [`LogFacadeSink`] by default
pub const MODULE_LOG_TARGET: &str = "modules";

/// Destination for module log messages
pub trait LogSink: Send + Sync {
    fn write(&self, message: &str, severity: Severity, module_header: Option<&str>);
}

/// Sink forwarding to the `log` facade
///
/// The module header becomes part of the log target (`<target>::<module>`),
/// so module output can be filtered per module with the usual log specs.
#[derive(Debug, Clone)]
pub struct LogFacadeSink {
    target: String,
}

impl LogFacadeSink {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Default for LogFacadeSink {
    fn default() -> Self {
        Self::new(MODULE_LOG_TARGET)
    }
}

impl LogSink for LogFacadeSink {
    fn write(&self, message: &str, severity: Severity, module_header: Option<&str>) {
        match module_header {
            Some(module) => {
                let target = format!("{}::{}", self.target, module);
                log::log!(target: target.as_str(), severity.level(), "{}", message);
            }
            None => log::log!(target: self.target.as_str(), severity.level(), "{}", message),
        }
    }
}

/// Split `message` into parts of at most `limit` characters, each prefixed
/// with `[part i/n] ` and the prefix counted against the limit. Messages
/// within the limit are returned unchanged. A limit too small to hold the
/// prefix still yields one character of body per part.
pub(crate) fn split_message(message: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let chars: Vec<char> = message.chars().collect();
    if chars.len() <= limit {
        return vec![message.to_string()];
    }

    // Wider part numbers shrink the body, which can add parts; settle first.
    let mut total = 1;
    let body = loop {
        let body = limit.saturating_sub(prefix_width(total)).max(1);
        let needed = chars.len().div_ceil(body);
        if needed <= total {
            break body;
        }
        total = needed;
    };

    let chunks: Vec<&[char]> = chars.chunks(body).collect();
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let body: String = chunk.iter().collect();
            format!("[part {}/{}] {}", index + 1, total, body)
        })
        .collect()
}

/// Width of the widest `[part i/n] ` prefix for `total` parts
fn prefix_width(total: usize) -> usize {
    let digits = total.to_string().len();
    "[part /] ".len() + 2 * digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_short_message_is_unchanged() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
        assert_eq!(split_message("", 10), vec![String::new()]);
    }

    #[test]
    fn test_long_message_is_split_into_numbered_parts() {
        let parts = split_message("abcdefghijklmnopqrst", 16);
        assert_eq!(
            parts,
            vec![
                "[part 1/4] abcde".to_string(),
                "[part 2/4] fghij".to_string(),
                "[part 3/4] klmno".to_string(),
                "[part 4/4] pqrst".to_string(),
            ]
        );
    }

    #[test]
    fn test_parts_never_exceed_the_limit() {
        let message = "x".repeat(500);
        for limit in [16, 20, 64, 499] {
            let parts = split_message(&message, limit);
            assert!(parts.len() > 1);
            assert!(parts.iter().all(|p| p.chars().count() <= limit), "limit {limit}");

            let rejoined: String = parts
                .iter()
                .map(|p| p.split_once("] ").unwrap().1)
                .collect();
            assert_eq!(rejoined, message);
        }
    }

    #[test]
    fn test_prefix_widens_with_part_count() {
        // Ten or more parts need two-digit numbers, leaving 3 characters of body
        let parts = split_message(&"y".repeat(48), 16);
        assert_eq!(parts.len(), 16);
        assert_eq!(parts[15], "[part 16/16] yyy");
        assert!(parts.iter().all(|p| p.chars().count() <= 16));
    }

    #[test]
    fn test_split_respects_character_boundaries() {
        let parts = split_message(&"é".repeat(20), 16);
        assert_eq!(parts.len(), 4);
        assert!(parts[3].ends_with(" ééééé"));
    }

    #[test]
    fn test_severity_maps_to_log_levels_in_order() {
        let levels: Vec<_> = Severity::iter().map(|s| s.level()).collect();
        let mut sorted = levels.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(levels, sorted);
    }
}
