//! Event subscription index.
//!
//! Built once from the installed listing's subscription tables, then
//! immutable. The index only answers "who listens"; delivering events is
//! the dispatcher's job.

use std::collections::BTreeMap;

use modreg_manifest::CallerScope;
use modreg_store::InstalledModuleRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    scope: CallerScope,
    subscriber: String,
}

type Table = BTreeMap<String, BTreeMap<String, Vec<Registration>>>;

/// Collects registrations before the index is frozen.
#[derive(Debug, Default)]
pub struct EventIndexBuilder {
    targets: Table,
}

impl EventIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `subscriber` to `event` on `target` for callers in `scope`.
    pub fn register_target(
        &mut self,
        target: &str,
        event: &str,
        scope: CallerScope,
        subscriber: &str,
    ) -> &mut Self {
        let registrations = self
            .targets
            .entry(target.to_string())
            .or_default()
            .entry(event.to_string())
            .or_default();
        let registration = Registration {
            scope,
            subscriber: subscriber.to_string(),
        };
        if !registrations.contains(&registration) {
            registrations.push(registration);
        }
        self
    }

    /// Register every subscription declared by `record`.
    pub fn register_record(&mut self, record: &InstalledModuleRecord) -> &mut Self {
        for subscription in record.targets.subscriptions() {
            self.register_target(
                &subscription.target,
                &subscription.event,
                subscription.scope,
                &record.module,
            );
        }
        self
    }

    pub fn build(self) -> EventIndex {
        EventIndex {
            targets: self.targets,
        }
    }
}

/// Immutable map of `(target, event)` to subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    targets: Table,
}

impl EventIndex {
    pub fn builder() -> EventIndexBuilder {
        EventIndexBuilder::new()
    }

    /// Index the subscription tables of `records`, in listing order.
    pub fn from_records(records: &[InstalledModuleRecord]) -> Self {
        let mut builder = EventIndexBuilder::new();
        for record in records {
            builder.register_record(record);
        }
        let index = builder.build();
        tracing::debug!(
            modules = records.len(),
            events = index.len(),
            "Built event index"
        );
        index
    }

    /// Modules subscribed to `event` on `target` when raised by `caller`.
    ///
    /// Includes exact-caller and wildcard registrations, in registration
    /// order, each module once.
    pub fn lookup_subscribers(&self, target: &str, event: &str, caller: &str) -> Vec<String> {
        let Some(registrations) = self.targets.get(target).and_then(|e| e.get(event)) else {
            return Vec::new();
        };

        let mut subscribers: Vec<String> = Vec::new();
        for registration in registrations {
            if registration.scope.matches(caller)
                && !subscribers.contains(&registration.subscriber)
            {
                subscribers.push(registration.subscriber.clone());
            }
        }
        subscribers
    }

    /// Every `(target, event)` pair with at least one registration.
    pub fn events(&self) -> impl Iterator<Item = (&str, &str)> {
        self.targets.iter().flat_map(|(target, events)| {
            events
                .keys()
                .map(move |event| (target.as_str(), event.as_str()))
        })
    }

    /// Number of `(target, event)` pairs.
    pub fn len(&self) -> usize {
        self.targets.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
