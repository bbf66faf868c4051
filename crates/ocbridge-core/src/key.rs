//! Storage-key derivation.
//!
//! The standard OpenChirp topic rules flatten a slash-separated topic into a
//! key the store can namespace on: a bounded number of `/` become `:`, a
//! bounded number of spaces become `_`, and the result is lowercased. The
//! substitutions are bounded to the first occurrences, so anything past the
//! transducer name survives untouched.
//!
//! The steps are ordered; each one operates on the output of the previous.

/// Hierarchy separator in bus topics.
pub const TOPIC_SEPARATOR: char = '/';

/// Namespace separator in storage keys.
pub const KEY_SEPARATOR: char = ':';

/// How many topic separators are converted into key separators.
///
/// Three matches the fixed `openchirp/device/<id>/<transducer>` topic depth.
/// If the namespace ever gains a level, this bound and
/// [`crate::topic::DEVICE_TELEMETRY_FILTER`] have to move together.
pub const SEPARATOR_SUBSTITUTIONS: usize = 3;

/// How many spaces are converted into underscores, same bound as the
/// separator substitutions.
pub const SPACE_SUBSTITUTIONS: usize = 3;

/// Replace at most the first `n` occurrences of `from` with `to`.
///
/// Occurrences past the bound are left untouched; the bound is part of the
/// key derivation contract.
pub fn replace_first_n(s: &str, from: char, to: char, n: usize) -> String {
    let mut out = String::with_capacity(s.len());
    let mut remaining = n;

    for c in s.chars() {
        if remaining > 0 && c == from {
            out.push(to);
            remaining -= 1;
        } else {
            out.push(c);
        }
    }

    out
}

/// Derive the storage key for a topic.
///
/// Applies the standard OpenChirp topic rules, in order:
/// 1. the first [`SEPARATOR_SUBSTITUTIONS`] `/` become [`KEY_SEPARATOR`]
/// 2. the first [`SPACE_SUBSTITUTIONS`] spaces become `_`
/// 3. the whole string is lowercased
///
/// Later steps operate on the already-substituted string; lowercasing is
/// always last. The derivation is deterministic: equal topics yield equal
/// keys.
pub fn storage_key(topic: &str) -> String {
    let key = replace_first_n(topic, TOPIC_SEPARATOR, KEY_SEPARATOR, SEPARATOR_SUBSTITUTIONS);
    let key = replace_first_n(&key, ' ', '_', SPACE_SUBSTITUTIONS);
    key.to_lowercase()
}
