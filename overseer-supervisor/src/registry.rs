//! Unit registry: immutable specs plus per-unit mutable state
//!
//! Each unit carries two locks:
//! - an async *operation* lock serialising start/stop/restart/probe for that unit
//!   only, held for the whole operation;
//! - a short synchronous *state* lock around [`UnitState`], never held across
//!   an `.await`.
//!
//! Readers only take the state lock, so snapshots never wait behind a slow stop.

use crate::backend::UnitHandle;
use crate::restart::RestartWindow;
use crate::{Result, SupervisorError, UnitSpec};
use chrono::{DateTime, Utc};
use overseer_core::unit::{UnitSnapshot, UnitStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::time::Instant;

/// Mutable per-unit state
#[derive(Debug)]
pub struct UnitState {
    pub status: UnitStatus,
    pub handle: Option<UnitHandle>,
    pub started_at: Option<DateTime<Utc>>,
    /// Monotonic time of the last probe, used for scheduling
    pub last_health_check: Option<Instant>,
    /// Wall-clock time of the last probe, used for reporting
    pub last_health_check_at: Option<DateTime<Utc>>,
    pub restarts: RestartWindow,
}

impl UnitState {
    fn new() -> Self {
        Self {
            status: UnitStatus::Pending,
            handle: None,
            started_at: None,
            last_health_check: None,
            last_health_check_at: None,
            restarts: RestartWindow::default(),
        }
    }

    /// Record a probe at the current time
    pub(crate) fn mark_checked(&mut self) {
        self.last_health_check = Some(Instant::now());
        self.last_health_check_at = Some(Utc::now());
    }
}

/// A registered unit
pub struct UnitEntry {
    spec: UnitSpec,
    auto_restart: AtomicBool,
    op: tokio::sync::Mutex<()>,
    state: Mutex<UnitState>,
}

impl UnitEntry {
    fn new(spec: UnitSpec) -> Self {
        Self {
            auto_restart: AtomicBool::new(spec.auto_restart),
            spec,
            op: tokio::sync::Mutex::new(()),
            state: Mutex::new(UnitState::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    /// Live auto-restart flag
    pub fn auto_restart(&self) -> bool {
        self.auto_restart.load(Ordering::SeqCst)
    }

    pub(crate) fn set_auto_restart(&self, enabled: bool) {
        self.auto_restart.store(enabled, Ordering::SeqCst);
    }

    /// Lock the unit's state briefly. Do not hold across `.await`.
    pub(crate) fn state(&self) -> MutexGuard<'_, UnitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive lifecycle access to this unit
    pub(crate) async fn lock_op(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.op.lock().await
    }

    /// Lifecycle access without waiting; `None` while another operation is in flight
    pub(crate) fn try_lock_op(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        self.op.try_lock().ok()
    }

    /// Read-only view of the unit
    pub fn snapshot(&self) -> UnitSnapshot {
        let mut state = self.state();
        let now = Instant::now();
        state.restarts.prune(now, self.spec.restart_window);

        UnitSnapshot {
            id: self.spec.id.clone(),
            kind: self.spec.kind(),
            priority: self.spec.priority,
            status: state.status,
            pid: state.handle.as_ref().and_then(UnitHandle::pid),
            started_at: state.started_at,
            last_health_check: state.last_health_check_at,
            restart_count_in_window: state.restarts.count(now, self.spec.restart_window),
            auto_restart: self.auto_restart(),
        }
    }
}

#[derive(Default)]
struct Units {
    order: Vec<Arc<UnitEntry>>,
    by_id: HashMap<String, Arc<UnitEntry>>,
}

/// All registered units, in registration order
#[derive(Default)]
pub struct UnitRegistry {
    units: RwLock<Units>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Units> {
        self.units.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Units> {
        self.units.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a unit
    pub fn register(&self, spec: UnitSpec) -> Result<Arc<UnitEntry>> {
        spec.validate()?;

        let mut units = self.write();
        if units.by_id.contains_key(&spec.id) {
            return Err(SupervisorError::DuplicateUnit(spec.id));
        }

        let entry = Arc::new(UnitEntry::new(spec));
        units.by_id.insert(entry.id().to_string(), entry.clone());
        units.order.push(entry.clone());
        Ok(entry)
    }

    /// Remove a unit from the registry
    pub(crate) fn remove(&self, id: &str) -> Result<Arc<UnitEntry>> {
        let mut units = self.write();
        let entry = units
            .by_id
            .remove(id)
            .ok_or_else(|| SupervisorError::UnitNotFound(id.to_string()))?;
        units.order.retain(|e| !Arc::ptr_eq(e, &entry));
        Ok(entry)
    }

    pub(crate) fn entry(&self, id: &str) -> Result<Arc<UnitEntry>> {
        self.read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| SupervisorError::UnitNotFound(id.to_string()))
    }

    /// Snapshot of one unit
    pub fn get(&self, id: &str) -> Result<UnitSnapshot> {
        Ok(self.entry(id)?.snapshot())
    }

    /// Snapshots of all units, in registration order
    pub fn list(&self) -> Vec<UnitSnapshot> {
        self.entries().iter().map(|e| e.snapshot()).collect()
    }

    /// Registered unit IDs, in registration order
    pub fn ids(&self) -> Vec<String> {
        self.read().order.iter().map(|e| e.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().order.is_empty()
    }

    /// Stable copy of the entry list
    pub(crate) fn entries(&self) -> Vec<Arc<UnitEntry>> {
        self.read().order.clone()
    }

    /// Priority descending; ties keep registration order
    pub(crate) fn startup_order(&self) -> Vec<Arc<UnitEntry>> {
        let mut entries = self.entries();
        entries.sort_by(|a, b| b.spec.priority.cmp(&a.spec.priority));
        entries
    }

    /// Priority ascending; ties keep registration order
    pub(crate) fn shutdown_order(&self) -> Vec<Arc<UnitEntry>> {
        let mut entries = self.entries();
        entries.sort_by(|a, b| a.spec.priority.cmp(&b.spec.priority));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(entries: &[Arc<UnitEntry>]) -> Vec<&str> {
        entries.iter().map(|e| e.id()).collect()
    }

    #[test]
    fn test_register_and_get() {
        let registry = UnitRegistry::new();
        registry
            .register(UnitSpec::process("worker", "true").with_priority(3))
            .unwrap();

        let snapshot = registry.get("worker").unwrap();
        assert_eq!(snapshot.status, UnitStatus::Pending);
        assert_eq!(snapshot.priority, 3);
        assert!(snapshot.auto_restart);
        assert_eq!(snapshot.restart_count_in_window, 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = UnitRegistry::new();
        registry.register(UnitSpec::process("worker", "true")).unwrap();

        let err = registry
            .register(UnitSpec::process("worker", "false"))
            .err()
            .unwrap();
        assert!(matches!(err, SupervisorError::DuplicateUnit(id) if id == "worker"));
    }

    #[test]
    fn test_unknown_unit() {
        let registry = UnitRegistry::new();
        assert!(matches!(
            registry.get("ghost"),
            Err(SupervisorError::UnitNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let registry = UnitRegistry::new();
        let err = registry.register(UnitSpec::process("", "true")).err().unwrap();
        assert!(matches!(err, SupervisorError::InvalidSpec { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_orders_break_ties_by_registration() {
        let registry = UnitRegistry::new();
        for (id, priority) in [("a", 5), ("b", 10), ("c", 5), ("d", 1)] {
            registry
                .register(UnitSpec::process(id, "true").with_priority(priority))
                .unwrap();
        }

        assert_eq!(ids(&registry.startup_order()), ["b", "a", "c", "d"]);
        assert_eq!(ids(&registry.shutdown_order()), ["d", "a", "c", "b"]);
        assert_eq!(registry.ids(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_remove() {
        let registry = UnitRegistry::new();
        registry.register(UnitSpec::process("a", "true")).unwrap();
        registry.register(UnitSpec::process("b", "true")).unwrap();

        registry.remove("a").unwrap();
        assert_eq!(registry.ids(), ["b"]);
        assert!(registry.remove("a").is_err());
    }

    #[tokio::test]
    async fn test_snapshot_does_not_wait_for_operation_lock() {
        let registry = UnitRegistry::new();
        let entry = registry.register(UnitSpec::process("a", "true")).unwrap();

        let _op = entry.lock_op().await;
        assert!(entry.try_lock_op().is_none());
        assert_eq!(registry.list().len(), 1);
    }
}
