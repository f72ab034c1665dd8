//! Routing table and its builder.
//!
//! # Responsibilities
//! - Turn `[demux]` rules into inclusion + exclusion maps
//! - Reject malformed rule sets as a whole
//! - Answer "which destinations want this event" for a repository
//!
//! # Design Decisions
//! - Immutable once built; the agent swaps whole tables, never edits one
//! - Repository rules shadow the organization rule entirely (no merging)
//! - Exclusions apply after fallback and only at exact `org/repo` scope
//! - Ordered sets so identical config yields identical, sorted results

use std::collections::{BTreeSet, HashMap};

use crate::config::schema::{DemuxConfig, EventDestinations, RuleConfig};
use crate::routing::error::ConfigShapeError;

/// Scope identifier: `"org"` or `"org/repo"`.
pub type RoutingKey = String;

/// Destination identifiers attached to one event type.
pub type EventSet = BTreeSet<String>;

/// Event type → destinations, for one routing key.
pub type EventsDemux = HashMap<String, EventSet>;

/// Build the fully-qualified repository key.
pub fn repo_key(org: &str, repo: &str) -> RoutingKey {
    format!("{org}/{repo}")
}

/// Inclusion and exclusion maps, always replaced as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    inclusion: HashMap<RoutingKey, EventsDemux>,
    exclusion: HashMap<RoutingKey, EventsDemux>,
}

impl RoutingTable {
    /// An empty table: every lookup resolves to nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from routing rules.
    ///
    /// Deterministic, and all-or-nothing: the first malformed entry rejects
    /// the whole rule set.
    pub fn build(config: &DemuxConfig) -> Result<Self, ConfigShapeError> {
        let mut builder = RoutingTableBuilder::new();
        for (index, rule) in config.rules.iter().enumerate() {
            builder.add_rule(index, rule)?;
        }
        Ok(builder.build())
    }

    pub fn exclusion(&self) -> &HashMap<RoutingKey, EventsDemux> {
        &self.exclusion
    }

    /// Number of routing keys with inclusion rules.
    pub fn key_count(&self) -> usize {
        self.inclusion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inclusion.is_empty() && self.exclusion.is_empty()
    }

    /// Full event → destinations view for a repository, after fallback and
    /// exclusion. The result is a fresh copy owned by the caller.
    pub fn events_for(&self, org: &str, repo: &str) -> EventsDemux {
        let fq = repo_key(org, repo);

        let mut matched = self
            .inclusion
            .get(&fq)
            .or_else(|| self.inclusion.get(org))
            .cloned()
            .unwrap_or_default();

        if let Some(excluded) = self.exclusion.get(&fq) {
            for (event, destinations) in matched.iter_mut() {
                if let Some(drop) = excluded.get(event) {
                    destinations.retain(|d| !drop.contains(d));
                }
            }
        }

        matched
    }

    /// Destinations for one event, sorted. Empty when nothing matches.
    ///
    /// Same result as `events_for(org, repo)[event]` without copying the
    /// other event types.
    pub fn destinations(&self, org: &str, repo: &str, event: &str) -> Vec<String> {
        let fq = repo_key(org, repo);

        let included = match self
            .inclusion
            .get(&fq)
            .or_else(|| self.inclusion.get(org))
            .and_then(|events| events.get(event))
        {
            Some(set) => set,
            None => return Vec::new(),
        };

        match self.exclusion.get(&fq).and_then(|events| events.get(event)) {
            Some(excluded) => included.difference(excluded).cloned().collect(),
            None => included.iter().cloned().collect(),
        }
    }
}

/// Accumulates rules into a candidate table.
#[derive(Debug, Default)]
pub struct RoutingTableBuilder {
    inclusion: HashMap<RoutingKey, EventsDemux>,
    exclusion: HashMap<RoutingKey, EventsDemux>,
}

impl RoutingTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one rule. Rules sharing a key are unioned per event type.
    pub fn add_rule(&mut self, index: usize, rule: &RuleConfig) -> Result<(), ConfigShapeError> {
        match key_segments(&rule.key) {
            Some(0) => return Err(ConfigShapeError::EmptyKey { index }),
            Some(_) => {}
            None => {
                return Err(ConfigShapeError::MalformedKey {
                    index,
                    key: rule.key.clone(),
                })
            }
        }

        let included = self.inclusion.entry(rule.key.clone()).or_default();
        merge_events(included, &rule.events, index, &rule.key)?;

        for (repo, events) in &rule.exclude {
            if key_segments(repo) != Some(2) {
                return Err(ConfigShapeError::ExclusionNotRepository {
                    index,
                    key: repo.clone(),
                });
            }
            let excluded = self.exclusion.entry(repo.clone()).or_default();
            merge_events(excluded, events, index, repo)?;
        }

        Ok(())
    }

    pub fn build(self) -> RoutingTable {
        RoutingTable {
            inclusion: self.inclusion,
            exclusion: self.exclusion,
        }
    }
}

/// `Some(0)` for an empty key, `Some(1|2)` for `org`/`org/repo`, `None` otherwise.
fn key_segments(key: &str) -> Option<usize> {
    if key.is_empty() {
        return Some(0);
    }
    let parts: Vec<&str> = key.split('/').collect();
    if parts.len() > 2 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts.len())
}

fn merge_events(
    into: &mut EventsDemux,
    events: &EventDestinations,
    index: usize,
    key: &str,
) -> Result<(), ConfigShapeError> {
    for (event, destinations) in events {
        if event.is_empty() {
            return Err(ConfigShapeError::EmptyEventType {
                index,
                key: key.to_string(),
            });
        }
        if destinations.iter().any(|d| d.is_empty()) {
            return Err(ConfigShapeError::EmptyDestination {
                index,
                key: key.to_string(),
                event: event.clone(),
            });
        }
        into.entry(event.clone())
            .or_default()
            .extend(destinations.iter().cloned());
    }
    Ok(())
}
