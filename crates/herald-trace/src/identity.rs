//! Listener identity formatting.
//!
//! Turns a [`Listener`] handle into the labels used by the instrumented
//! dispatcher: a kind, a human-readable `pretty` string, and the
//! `event.pretty` key under which call records and timing periods are filed.

use std::fmt;

use herald_dispatch::{Callable, Listener};
use serde::{Deserialize, Serialize};

/// The kind of callable behind a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListenerType {
    /// A named free function.
    Function,
    /// An anonymous closure.
    Closure,
    /// A method bound to an instance.
    Method,
    /// A type-level method.
    StaticMethod,
}

impl fmt::Display for ListenerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerType::Function => write!(f, "Function"),
            ListenerType::Closure => write!(f, "Closure"),
            ListenerType::Method => write!(f, "Method"),
            ListenerType::StaticMethod => write!(f, "StaticMethod"),
        }
    }
}

/// Derived description of a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerIdentity {
    /// Callable kind.
    #[serde(rename = "type")]
    pub kind: ListenerType,
    /// Human-readable label.
    pub pretty: String,
    /// Short owner type name, for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Method name, for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// File the listener was built in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line the listener was built on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl ListenerIdentity {
    /// Describe `listener`.
    pub fn of(listener: &Listener) -> Self {
        let (kind, pretty, owner, method) = match listener.callable() {
            Callable::Function { name } => (ListenerType::Function, name.to_string(), None, None),
            Callable::Closure => (ListenerType::Closure, "closure".to_string(), None, None),
            Callable::Method { owner, method } => {
                let owner = short_type_name(owner);
                (
                    ListenerType::Method,
                    format!("{}::{}", owner, method),
                    Some(owner),
                    Some(method.to_string()),
                )
            }
            Callable::StaticMethod { owner, method } => {
                let owner = short_type_name(owner);
                (
                    ListenerType::StaticMethod,
                    format!("{}::{}", owner, method),
                    Some(owner),
                    Some(method.to_string()),
                )
            }
        };

        let location = listener.location();
        Self {
            kind,
            pretty,
            owner,
            method,
            file: location.map(|l| l.file().to_string()),
            line: location.map(|l| l.line()),
        }
    }

    /// Key of this listener for `event_name`: `event.pretty`.
    pub fn key(&self, event_name: &str) -> String {
        format!("{}.{}", event_name, self.pretty)
    }
}

impl fmt::Display for ListenerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty)
    }
}

/// Strip module paths from a type name, generics included.
///
/// `app::mail::Mailer<alloc::string::String>` becomes `Mailer<String>`.
pub fn short_type_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut segment = String::new();

    for c in name.chars() {
        match c {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(last_path_segment(&segment));
                segment.clear();
                out.push(c);
            }
            _ => segment.push(c),
        }
    }
    out.push_str(last_path_segment(&segment));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}
