//! Declared event subscriptions (`targets`).
//!
//! A manifest declares which events raised elsewhere it wants to be
//! notified about, as a nested table `target -> event -> callers`:
//!
//! ```json
//! "targets": {
//!   "post":   { "create": "*" },
//!   "member": { "login": ["admin", "site"] }
//! }
//! ```
//!
//! `"*"` subscribes to the event whoever raises it; a list restricts the
//! subscription to the named callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The wildcard caller token.
pub const WILDCARD: &str = "*";

/// Caller list as written in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Callers {
    One(String),
    Many(Vec<String>),
}

impl Callers {
    /// Expand into caller scopes, in declaration order.
    pub fn scopes(&self) -> Vec<CallerScope> {
        match self {
            Self::One(caller) => vec![CallerScope::parse(caller)],
            Self::Many(callers) => callers.iter().map(|c| CallerScope::parse(c)).collect(),
        }
    }
}

/// Which callers a subscription applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallerScope {
    /// Every caller (`"*"`).
    Any,
    /// Exactly this caller.
    Exactly(String),
}

impl CallerScope {
    pub fn parse(caller: &str) -> Self {
        if caller == WILDCARD {
            Self::Any
        } else {
            Self::Exactly(caller.to_string())
        }
    }

    pub fn matches(&self, caller: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exactly(expected) => expected == caller,
        }
    }
}

/// One flattened `(target, event, scope)` entry of a targets table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub target: String,
    pub event: String,
    pub scope: CallerScope,
}

/// The event-subscription table of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTargets(BTreeMap<String, BTreeMap<String, Callers>>);

impl EventTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `callers` for `target`/`event`, replacing a previous entry.
    pub fn insert(&mut self, target: impl Into<String>, event: impl Into<String>, callers: Callers) {
        self.0
            .entry(target.into())
            .or_default()
            .insert(event.into(), callers);
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    pub fn get(&self, target: &str, event: &str) -> Option<&Callers> {
        self.0.get(target).and_then(|events| events.get(event))
    }

    /// Flatten the table into individual subscriptions.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut out = Vec::new();
        for (target, events) in &self.0 {
            for (event, callers) in events {
                for scope in callers.scopes() {
                    out.push(Subscription {
                        target: target.clone(),
                        event: event.clone(),
                        scope,
                    });
                }
            }
        }
        out
    }
}
