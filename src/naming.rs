//! Naming grammar for messages, destinations, and streams
//!
//! Message names double as schema registry keys, so the source loader and the
//! scaffolding generators share these checks.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{NameKind, Result, SyncError};

const MESSAGE_RULE: &str = "Message names must be lowercase, alphanumeric and dot separated";
const DESTINATION_RULE: &str =
    "Message destination must be lowercase, alphanumeric and dot/colon separated";
const STREAM_RULE: &str =
    "Stream name must be all alphanumeric, uppercase, and underscore separated";

fn message_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:\.[a-z0-9]+)*$").expect("valid regex"))
}

fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:[.:][a-z0-9]+)*$").expect("valid regex"))
}

fn stream_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("valid regex"))
}

fn check(re: &Regex, kind: NameKind, rule: &'static str, name: &str) -> Result<()> {
    if re.is_match(name) {
        Ok(())
    } else {
        Err(SyncError::InvalidName {
            kind,
            name: name.to_string(),
            rule,
        })
    }
}

/// Validate a message (and therefore schema) name, e.g. `app.widgets.created`
pub fn validate_message_name(name: &str) -> Result<()> {
    check(message_re(), NameKind::Message, MESSAGE_RULE, name)
}

/// Validate a consumer destination, e.g. `users.backend:notifier`
pub fn validate_destination_name(name: &str) -> Result<()> {
    check(destination_re(), NameKind::Destination, DESTINATION_RULE, name)
}

/// Validate a stream name, e.g. `WIDGETS`
pub fn validate_stream_name(name: &str) -> Result<()> {
    check(stream_re(), NameKind::Stream, STREAM_RULE, name)
}

pub fn format_stream_name(name: &str) -> String {
    name.to_uppercase()
}

pub fn dot_to_colon(name: &str) -> String {
    name.replace('.', ":")
}

pub fn dot_to_underscore(name: &str) -> String {
    name.replace('.', "_")
}

pub fn colon_to_underscore(name: &str) -> String {
    name.replace(':', "_")
}

/// Durable consumer name for `destination` reading `message`
pub fn consumer_name(destination: &str, message: &str) -> String {
    let dest = dot_to_underscore(&colon_to_underscore(destination));
    format!("{}_{}", dest, dot_to_underscore(message))
}
