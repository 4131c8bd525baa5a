//! Instance registry
//!
//! Maps small integer ids to running [`ProcInstance`]s.
//!
//! # Locking
//!
//! ```text
//!   registry API ──► slot API ──► instance API ──► { fair_in, fair_out }
//!                                                    ▲
//!   send_frame / recv_frame ─────────────────────────┘  (fairness lock only)
//! ```
//!
//! - The registry API lock serializes POST, DELETE and listing, and guards
//!   the free-slot set. Functions that need it take the held guard.
//! - Per-id operations take the registry lock only long enough to lock the
//!   slot, then release it: the slot API lock alone keeps the instance from
//!   being removed or swapped while the operation runs.
//! - The fairness locks are taken by control paths only for the pointer swap
//!   in [`Slot::install`]. The module lock is never taken while a fairness
//!   lock is held.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::media::Frame;
use crate::processor::{OpenParams, PrivateOpt, ProcInstance, ProcOpt, SETTINGS_KEY};
use crate::settings::{self, Settings};
use crate::stats::ProcStats;

use super::config::{RegistryConfig, MAX_INSTANCES};
use super::module::ModuleRegistry;
use super::repr::{Link, PostResponse, ProcSummary, ProcsListing};
use super::request::{ProcsFilter, ProcsRequest, FORCED_PROC_ID_KEY, PROC_NAME_KEY};
use super::slot::{ProcRef, Slot, SlotGuard};

#[derive(Debug)]
struct ProcsState {
    free: BTreeSet<usize>,
}

type ProcsGuard<'a> = MutexGuard<'a, ProcsState>;

/// Registry of processor instances
pub struct Procs {
    config: RegistryConfig,
    modules: Arc<ModuleRegistry>,
    state: Mutex<ProcsState>,
    slots: Box<[Slot]>,
}

impl Procs {
    /// Open a registry creating instances from the types in `modules`
    pub fn open(config: RegistryConfig, modules: Arc<ModuleRegistry>) -> Result<Self> {
        if config.max_instances == 0 || config.max_instances > MAX_INSTANCES {
            return Err(Error::invalid(format!(
                "registry size {} not in 1..={MAX_INSTANCES}",
                config.max_instances
            )));
        }
        let slots: Box<[Slot]> = (0..config.max_instances).map(|_| Slot::default()).collect();
        let free = (0..config.max_instances).collect();

        tracing::info!(
            max_instances = config.max_instances,
            prefix = %config.prefix,
            "Processor registry opened"
        );

        Ok(Self {
            config,
            modules,
            state: Mutex::new(ProcsState { free }),
            slots,
        })
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Processor types available to this registry
    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.modules
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of running instances
    pub fn len(&self) -> usize {
        self.slots.len() - self.state.lock().free.len()
    }

    /// Whether no instance is running
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a command, returning its JSON representation
    pub fn dispatch(&self, request: ProcsRequest) -> Result<Value> {
        match request {
            ProcsRequest::List(filter) => to_json(&self.list(&filter)?),
            ProcsRequest::Post {
                proc_name,
                settings,
            } => {
                let proc_id = self.post(&proc_name, &settings)?;
                to_json(&PostResponse { proc_id })
            }
            ProcsRequest::Delete(id) => self.delete(id).map(|()| Value::Null),
            ProcsRequest::Get(id) => self.get(id).map(Value::Object),
            ProcsRequest::Put { id, settings } => self.put(id, &settings).map(|()| Value::Null),
            ProcsRequest::Unblock(id) => self.unblock(id).map(|()| Value::Null),
            ProcsRequest::Private { id, opt } => self.private_opt(id, opt),
        }
    }

    /// Create an instance of `proc_name`, returning its id
    ///
    /// `settings` may carry `forced_proc_id` to pick the slot; otherwise the
    /// lowest free slot is used.
    pub fn post(&self, proc_name: &str, settings: &str) -> Result<usize> {
        let settings = Settings::parse(settings)?;
        let mut state = self.state.lock();
        self.post_locked(&mut state, proc_name, &settings)
    }

    /// Remove and close instance `id`
    pub fn delete(&self, id: usize) -> Result<()> {
        let mut state = self.state.lock();
        self.delete_locked(&mut state, id)
    }

    /// List running instances
    pub fn list(&self, filter: &ProcsFilter) -> Result<ProcsListing> {
        let state = self.state.lock();
        Ok(self.list_locked(&state, filter))
    }

    /// Settings snapshot of instance `id`
    ///
    /// `{"latency_avg_usec": .., "settings": {"proc_name": .., ..}}`
    pub fn get(&self, id: usize) -> Result<Map<String, Value>> {
        self.id_dispatch(id, |_, _, instance| snapshot(&instance))
    }

    /// Update instance `id`
    ///
    /// When the settings name a different `proc_name`, the instance is first
    /// replaced by a new instance of that type carrying over the current
    /// settings; the id is kept.
    pub fn put(&self, id: usize, settings: &str) -> Result<()> {
        let settings = Settings::parse(settings)?;
        self.id_dispatch(id, |slot, api, instance| self.put_slot(id, slot, api, instance, settings))
    }

    /// Switch instance `id` to non-blocking I/O
    pub fn unblock(&self, id: usize) -> Result<()> {
        self.id_dispatch(id, |_, _, instance| instance.unblock())
    }

    /// Type-specific option on instance `id`
    pub fn private_opt(&self, id: usize, opt: PrivateOpt) -> Result<Value> {
        self.id_dispatch(id, |_, _, instance| instance.opt(ProcOpt::Private(opt)))
    }

    /// Statistics of instance `id`
    pub fn stats(&self, id: usize) -> Result<ProcStats> {
        self.id_dispatch(id, |_, _, instance| Ok(instance.stats()))
    }

    /// Send a frame to instance `id`
    ///
    /// Only the slot's input fairness lock is taken.
    pub fn send_frame(&self, id: usize, frame: &Frame) -> Result<()> {
        let slot = self.slot(id)?;
        let fair = slot.lock_input();
        let instance = fair.as_ref().ok_or_else(|| no_instance(id))?;
        instance.send_frame(frame)
    }

    /// Receive a frame from instance `id`
    ///
    /// Only the slot's output fairness lock is taken.
    pub fn recv_frame(&self, id: usize) -> Result<Frame> {
        let slot = self.slot(id)?;
        let fair = slot.lock_output();
        let instance = fair.as_ref().ok_or_else(|| no_instance(id))?;
        instance.recv_frame()
    }

    /// Remove and close every instance
    pub fn close(&self) {
        let mut state = self.state.lock();
        for id in 0..self.slots.len() {
            if state.free.contains(&id) {
                continue;
            }
            if let Err(e) = self.delete_locked(&mut state, id) {
                tracing::warn!(proc_id = id, error = %e, "Failed to remove processor on close");
            }
        }
    }

    fn slot(&self, id: usize) -> Result<&Slot> {
        self.slots
            .get(id)
            .ok_or_else(|| Error::not_found(format!("proc id {id} out of range")))
    }

    fn open_params(&self, id: usize) -> OpenParams {
        OpenParams::new(id)
            .fifo_capacities(self.config.fifo_in_capacity, self.config.fifo_out_capacity)
            .stats_interval(self.config.stats_interval)
    }

    fn post_locked(&self, state: &mut ProcsGuard<'_>, proc_name: &str, settings: &Settings) -> Result<usize> {
        let id = match settings.get_i64(FORCED_PROC_ID_KEY)? {
            Some(forced) => {
                let id = usize::try_from(forced)
                    .ok()
                    .filter(|&id| id < self.slots.len())
                    .ok_or_else(|| Error::invalid(format!("forced proc id {forced} out of range")))?;
                if !state.free.contains(&id) {
                    return Err(Error::Conflict(format!("proc id {id} already in use")));
                }
                id
            }
            None => state
                .free
                .first()
                .copied()
                .ok_or_else(|| Error::OutOfMemory("no free processor slot".into()))?,
        };

        let proc_if = self.modules.lookup(proc_name)?;
        let instance = Arc::new(ProcInstance::open(proc_if, settings, &self.open_params(id))?);

        let slot = &self.slots[id];
        let mut api = slot.lock_api();
        let previous = slot.install(&mut api, Some(instance));
        drop(api);
        state.free.remove(&id);

        if let Some(previous) = previous {
            tracing::error!(proc_id = id, "Free slot held an instance");
            debug_assert!(false, "free slot {id} held an instance");
            previous.close();
        }

        tracing::info!(proc_id = id, proc_name = %proc_name, "Processor registered");
        Ok(id)
    }

    fn delete_locked(&self, state: &mut ProcsGuard<'_>, id: usize) -> Result<()> {
        let slot = self.slot(id)?;
        let mut api = slot.lock_api();
        let instance = api.clone().ok_or_else(|| no_instance(id))?;
        check_identity(id, &instance);

        // Wake any thread blocked inside the instance before taking the
        // fairness locks it may be holding.
        match instance.unblock() {
            Ok(()) | Err(Error::NotModified) => {}
            Err(e) => tracing::warn!(proc_id = id, error = %e, "Unblock before delete failed"),
        }

        let removed = slot.install(&mut api, None);
        drop(api);
        state.free.insert(id);

        if let Some(removed) = removed {
            removed.close();
        }
        tracing::info!(proc_id = id, proc_name = %instance.name(), "Processor unregistered");
        Ok(())
    }

    fn list_locked(&self, _state: &ProcsGuard<'_>, filter: &ProcsFilter) -> ProcsListing {
        let mut procs = Vec::new();
        for (id, slot) in self.slots.iter().enumerate() {
            let Some(instance) = slot.lock_api().clone() else {
                continue;
            };
            if instance.id() != id {
                tracing::error!(proc_id = id, instance_id = instance.id(), "Inconsistent slot skipped");
                continue;
            }
            if !filter.matches(instance.name()) {
                continue;
            }
            procs.push(ProcSummary {
                proc_id: id,
                proc_name: instance.name().to_string(),
                links: vec![Link::self_link(self.config.href(id))],
            });
        }
        ProcsListing {
            prefix: self.config.prefix.clone(),
            procs,
        }
    }

    /// Run `op` on the instance in slot `id` under the slot API lock
    ///
    /// The registry lock is held only until the slot is locked.
    fn id_dispatch<T>(
        &self,
        id: usize,
        op: impl FnOnce(&Slot, &mut SlotGuard<'_>, ProcRef) -> Result<T>,
    ) -> Result<T> {
        let state = self.state.lock();
        let slot = self.slot(id)?;
        let mut api = slot.lock_api();
        let instance = api.clone().ok_or_else(|| no_instance(id))?;
        drop(state);
        check_identity(id, &instance);

        op(slot, &mut api, instance)
    }

    fn put_slot(
        &self,
        id: usize,
        slot: &Slot,
        api: &mut SlotGuard<'_>,
        current: ProcRef,
        settings: Settings,
    ) -> Result<()> {
        let target = match settings.get_str(PROC_NAME_KEY) {
            Some(name) if name != current.name() => self.substitute(id, slot, api, &current, &name)?,
            _ => current,
        };
        target.put_settings(&settings)
    }

    /// Replace the instance in `slot` with a new instance of type `proc_name`
    ///
    /// The new instance is opened with the current settings before anything
    /// is changed, so a failure leaves the slot untouched.
    fn substitute(
        &self,
        id: usize,
        slot: &Slot,
        api: &mut SlotGuard<'_>,
        current: &ProcRef,
        proc_name: &str,
    ) -> Result<ProcRef> {
        let proc_if = self.modules.lookup(proc_name)?;

        let carried = match current.get_settings() {
            Ok(mut snapshot) => match snapshot.shift_remove(SETTINGS_KEY) {
                Some(Value::Object(fields)) => Settings::from_map(fields),
                _ => Settings::new(),
            },
            Err(Error::NotFound(_)) => Settings::new(),
            Err(e) => return Err(e),
        };

        let fresh = Arc::new(ProcInstance::open(proc_if, &carried, &self.open_params(id))?);

        match current.unblock() {
            Ok(()) | Err(Error::NotModified) => {}
            Err(e) => tracing::warn!(proc_id = id, error = %e, "Unblock before substitution failed"),
        }
        let previous = slot.install(api, Some(Arc::clone(&fresh)));
        if let Some(previous) = previous {
            previous.close();
        }

        tracing::info!(
            proc_id = id,
            from = %current.name(),
            to = %proc_name,
            "Processor type substituted"
        );
        Ok(fresh)
    }
}

impl Drop for Procs {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Procs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procs")
            .field("capacity", &self.slots.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// GET snapshot with `proc_name` first in the settings object
fn snapshot(instance: &ProcInstance) -> Result<Map<String, Value>> {
    let mut snapshot = match instance.get_settings() {
        Ok(snapshot) => snapshot,
        Err(Error::NotFound(_)) => {
            let mut empty = Map::new();
            empty.insert(SETTINGS_KEY.to_owned(), Value::Object(Map::new()));
            empty
        }
        Err(e) => return Err(e),
    };
    if let Some(Value::Object(fields)) = snapshot.get_mut(SETTINGS_KEY) {
        let rest = std::mem::take(fields);
        *fields = settings::prepend(PROC_NAME_KEY, Value::from(instance.name()), rest);
    }
    Ok(snapshot)
}

fn check_identity(id: usize, instance: &ProcInstance) {
    if instance.id() != id {
        tracing::error!(proc_id = id, instance_id = instance.id(), "Slot holds a foreign instance");
        debug_assert!(false, "slot {id} holds instance {}", instance.id());
    }
}

fn no_instance(id: usize) -> Error {
    Error::not_found(format!("no processor with id {id}"))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Failed(format!("serialize reply: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::bypass;

    fn registry(max: usize) -> Procs {
        let modules = ModuleRegistry::open();
        modules.register(&bypass::proc_if()).unwrap();
        modules.register(&bypass::proc_if_named("bypass2")).unwrap();
        Procs::open(RegistryConfig::default().max_instances(max), modules).unwrap()
    }

    #[test]
    fn test_post_assigns_lowest_free_id() {
        let procs = registry(4);
        assert_eq!(procs.post("bypass", "").unwrap(), 0);
        assert_eq!(procs.post("bypass", "").unwrap(), 1);
        procs.delete(0).unwrap();
        assert_eq!(procs.post("bypass", "").unwrap(), 0);
        assert_eq!(procs.len(), 2);
    }

    #[test]
    fn test_post_unknown_type() {
        let procs = registry(2);
        assert!(matches!(procs.post("h264", ""), Err(Error::NotFound(_))));
        assert!(procs.is_empty());
    }

    #[test]
    fn test_post_forced_id() {
        let procs = registry(4);
        assert_eq!(procs.post("bypass", "forced_proc_id=3").unwrap(), 3);
        assert!(matches!(
            procs.post("bypass", "forced_proc_id=3"),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            procs.post("bypass", "forced_proc_id=4"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            procs.post("bypass", "forced_proc_id=-1"),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(procs.post("bypass", "").unwrap(), 0);
    }

    #[test]
    fn test_registry_full() {
        let procs = registry(1);
        procs.post("bypass", "").unwrap();
        assert!(matches!(procs.post("bypass", ""), Err(Error::OutOfMemory(_))));
    }

    #[test]
    fn test_post_malformed_settings() {
        let procs = registry(1);
        assert!(matches!(
            procs.post("bypass", r#"{"setting1":"#),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_get_injects_proc_name() {
        let procs = registry(2);
        let id = procs.post("bypass", "setting1=100").unwrap();
        let snapshot = procs.get(id).unwrap();

        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, ["latency_avg_usec", "settings"]);
        let settings = snapshot["settings"].as_object().unwrap();
        assert_eq!(settings.keys().next().map(String::as_str), Some("proc_name"));
        assert_eq!(settings["proc_name"], Value::from("bypass"));
        assert_eq!(settings["setting1"], Value::from(100));
    }

    #[test]
    fn test_put_same_type() {
        let procs = registry(2);
        let id = procs.post("bypass", "setting1=1").unwrap();
        procs.put(id, "proc_name=bypass&setting1=2").unwrap();
        assert_eq!(procs.get(id).unwrap()["settings"]["setting1"], Value::from(2));
    }

    #[test]
    fn test_put_substitutes_type() {
        let procs = registry(2);
        let id = procs.post("bypass", "setting1=100").unwrap();
        procs.put(id, "proc_name=bypass2").unwrap();

        let settings = procs.get(id).unwrap()["settings"].clone();
        assert_eq!(settings["proc_name"], Value::from("bypass2"));
        assert_eq!(settings["setting1"], Value::from(100));

        let listing = procs.list(&ProcsFilter::All).unwrap();
        assert_eq!(listing.procs.len(), 1);
        assert_eq!(listing.procs[0].proc_id, id);
        assert_eq!(listing.procs[0].proc_name, "bypass2");
    }

    #[test]
    fn test_put_unknown_type_leaves_slot() {
        let procs = registry(2);
        let id = procs.post("bypass", "setting1=7").unwrap();
        assert!(matches!(
            procs.put(id, "proc_name=nope&setting1=8"),
            Err(Error::NotFound(_))
        ));
        let settings = procs.get(id).unwrap()["settings"].clone();
        assert_eq!(settings["proc_name"], Value::from("bypass"));
        assert_eq!(settings["setting1"], Value::from(7));

        // The old instance still moves frames
        let frame = Frame::from_bytes(crate::media::SampleFormat::Bytes, b"x").unwrap();
        procs.send_frame(id, &frame).unwrap();
        assert_eq!(procs.recv_frame(id).unwrap().row(0, 0).unwrap(), b"x");
    }

    #[test]
    fn test_id_operations_on_empty_slot() {
        let procs = registry(2);
        assert!(matches!(procs.get(1), Err(Error::NotFound(_))));
        assert!(matches!(procs.put(1, "setting1=1"), Err(Error::NotFound(_))));
        assert!(matches!(procs.unblock(1), Err(Error::NotFound(_))));
        assert!(matches!(procs.delete(1), Err(Error::NotFound(_))));
        assert!(matches!(procs.get(99), Err(Error::NotFound(_))));
        let frame = Frame::new();
        assert!(matches!(procs.send_frame(1, &frame), Err(Error::NotFound(_))));
        assert!(matches!(procs.recv_frame(7), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_filters() {
        let procs = registry(4);
        procs.post("bypass", "").unwrap();
        procs.post("bypass2", "").unwrap();
        procs.post("bypass", "").unwrap();

        let all = procs.list(&ProcsFilter::All).unwrap();
        assert_eq!(all.procs.len(), 3);
        assert_eq!(all.procs[1].links[0].href, "/procs/1.json");

        let only = procs.list(&ProcsFilter::Name("bypass".into())).unwrap();
        let ids: Vec<usize> = only.procs.iter().map(|p| p.proc_id).collect();
        assert_eq!(ids, [0, 2]);

        let others = procs.list(&ProcsFilter::NotName("bypass".into())).unwrap();
        let ids: Vec<usize> = others.procs.iter().map(|p| p.proc_id).collect();
        assert_eq!(ids, [1]);
    }

    #[test]
    fn test_dispatch_shapes() {
        let procs = registry(2);
        let reply = procs
            .dispatch(ProcsRequest::Post {
                proc_name: "bypass".into(),
                settings: "setting1=100".into(),
            })
            .unwrap();
        assert_eq!(reply, serde_json::json!({"proc_id": 0}));

        let listing = procs.dispatch(ProcsRequest::List(ProcsFilter::All)).unwrap();
        assert_eq!(listing["procs"][0]["proc_name"], Value::from("bypass"));

        let private = procs
            .dispatch(ProcsRequest::Private {
                id: 0,
                opt: PrivateOpt::new("queue_depth", Value::Null),
            })
            .unwrap();
        assert_eq!(private["output"], Value::from(0));

        assert_eq!(procs.dispatch(ProcsRequest::Delete(0)).unwrap(), Value::Null);
    }

    #[test]
    fn test_stats_by_id() {
        let procs = registry(1);
        let id = procs.post("bypass", "").unwrap();
        let stats = procs.stats(id).unwrap();
        assert_eq!(stats, ProcStats::default());
    }

    #[test]
    fn test_close_removes_everything() {
        let procs = registry(3);
        procs.post("bypass", "").unwrap();
        procs.post("bypass", "").unwrap();
        procs.close();
        assert!(procs.is_empty());
        assert!(procs.list(&ProcsFilter::All).unwrap().procs.is_empty());
    }
}
