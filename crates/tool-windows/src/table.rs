//! The settled cache of tool windows and the only code that writes to it.
//!
//! Three write paths feed the table: results of commands this process issued,
//! push events from the host, and per-context snapshots. Every path replaces
//! whole rows; nothing merges individual fields from an older row.

use std::collections::HashMap;

use crate::events::ToolWindowEvent;
use crate::record::{ContextKey, ToolWindowRecord, WindowPosition, WindowSize};

/// State a successful local command is known to have produced on the host.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalWrite {
    Opened(ToolWindowRecord),
    Docked {
        id: String,
    },
    Undocked {
        id: String,
        position: WindowPosition,
        size: WindowSize,
    },
    Closed {
        id: String,
    },
    ContextClosed(ContextKey),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted,
    Updated,
    Removed(usize),
    Unchanged,
    Replaced {
        previous: usize,
        current: usize,
        rejected: usize,
    },
    Rejected(String),
}

#[derive(Clone, Debug, Default)]
pub struct ToolWindowTable {
    records: HashMap<String, ToolWindowRecord>,
}

impl ToolWindowTable {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ToolWindowRecord> {
        self.records.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows owned by `context`, in launcher order.
    #[must_use]
    pub fn records_for(&self, context: &ContextKey) -> Vec<&ToolWindowRecord> {
        let mut rows = self
            .records
            .values()
            .filter(|record| context.matches(record))
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| {
            left.tool_kind
                .spec()
                .launcher_order
                .cmp(&right.tool_kind.spec().launcher_order)
                .then_with(|| left.id.cmp(&right.id))
        });
        rows
    }

    #[must_use]
    pub fn contexts(&self) -> Vec<ContextKey> {
        let mut contexts = self
            .records
            .values()
            .map(ToolWindowRecord::context)
            .collect::<Vec<_>>();
        contexts.sort();
        contexts.dedup();
        contexts
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn apply_local(&mut self, write: LocalWrite) -> ReconcileOutcome {
        match write {
            LocalWrite::Opened(mut record) => {
                if !record.identity_matches() {
                    return ReconcileOutcome::Rejected(format!(
                        "opened window {} does not match its identity",
                        record.id
                    ));
                }
                record.mark_floating();
                self.put(record)
            }
            LocalWrite::Docked { id } => match self.records.get_mut(&id) {
                Some(record) if record.docked => ReconcileOutcome::Unchanged,
                Some(record) => {
                    record.mark_docked();
                    ReconcileOutcome::Updated
                }
                None => ReconcileOutcome::Unchanged,
            },
            LocalWrite::Undocked { id, position, size } => match self.records.get_mut(&id) {
                Some(record) => {
                    let before = record.clone();
                    record.mark_floating();
                    record.last_position = position;
                    record.last_size = size;
                    if *record == before {
                        ReconcileOutcome::Unchanged
                    } else {
                        ReconcileOutcome::Updated
                    }
                }
                None => ReconcileOutcome::Unchanged,
            },
            LocalWrite::Closed { id } => self.remove(&id),
            LocalWrite::ContextClosed(context) => {
                let before = self.records.len();
                self.records.retain(|_, record| !context.matches(record));
                removed_outcome(before - self.records.len())
            }
        }
    }

    pub fn apply_event(&mut self, event: &ToolWindowEvent) -> ReconcileOutcome {
        let incoming = event.record();
        if !incoming.identity_matches() {
            return ReconcileOutcome::Rejected(format!(
                "event for {} does not match its identity",
                incoming.id
            ));
        }
        match event {
            ToolWindowEvent::Closed(record) => self.remove(&record.id),
            ToolWindowEvent::Docked(record) => {
                let mut record = record.clone();
                record.mark_docked();
                self.put(record)
            }
            ToolWindowEvent::Undocked(record) => {
                let mut record = record.clone();
                record.mark_floating();
                self.put(record)
            }
        }
    }

    /// Replaces every row of `context` with `snapshot`. Rows of other contexts
    /// are untouched; snapshot rows that belong elsewhere are rejected.
    pub fn replace_context(
        &mut self,
        context: &ContextKey,
        snapshot: Vec<ToolWindowRecord>,
    ) -> ReconcileOutcome {
        let previous = self
            .records
            .values()
            .filter(|record| context.matches(record))
            .count();
        self.records.retain(|_, record| !context.matches(record));

        let mut rejected = 0;
        let mut current = 0;
        for mut record in snapshot {
            if !context.matches(&record) || !record.identity_matches() {
                tracing::warn!(
                    id = %record.id,
                    context = %context,
                    "snapshot row rejected"
                );
                rejected += 1;
                continue;
            }
            normalize_flags(&mut record);
            if self.records.insert(record.id.clone(), record).is_none() {
                current += 1;
            }
        }

        ReconcileOutcome::Replaced {
            previous,
            current,
            rejected,
        }
    }

    fn put(&mut self, record: ToolWindowRecord) -> ReconcileOutcome {
        match self.records.get(&record.id) {
            Some(existing)
                if existing.book_id != record.book_id
                    || existing.version_id != record.version_id =>
            {
                ReconcileOutcome::Rejected(format!(
                    "{} belongs to {}, not {}",
                    record.id,
                    existing.context(),
                    record.context()
                ))
            }
            Some(existing) if *existing == record => ReconcileOutcome::Unchanged,
            Some(_) => {
                self.records.insert(record.id.clone(), record);
                ReconcileOutcome::Updated
            }
            None => {
                self.records.insert(record.id.clone(), record);
                ReconcileOutcome::Inserted
            }
        }
    }

    fn remove(&mut self, id: &str) -> ReconcileOutcome {
        removed_outcome(usize::from(self.records.remove(id).is_some()))
    }
}

fn removed_outcome(count: usize) -> ReconcileOutcome {
    if count == 0 {
        ReconcileOutcome::Unchanged
    } else {
        ReconcileOutcome::Removed(count)
    }
}

fn normalize_flags(record: &mut ToolWindowRecord) {
    if record.docked {
        record.mark_docked();
    } else {
        record.mark_floating();
    }
}
