use crate::error::JSError;
pub use gc_arena::GcWeak;
pub use gc_arena::Mutation as MutationContext;
pub use gc_arena::collect::Trace as GcTrace;
pub use gc_arena::lock::RefLock as GcCell;
pub use gc_arena::{Collect, Gc};
pub type GcPtr<'gc, T> = Gc<'gc, GcCell<T>>;
use std::rc::Rc;

#[inline]
pub fn new_gc_cell_ptr<'gc, T: 'gc + Collect<'gc>>(mc: &MutationContext<'gc>, value: T) -> GcPtr<'gc, T> {
    Gc::new(mc, GcCell::new(value))
}

mod value;
pub use value::*;

mod property_key;
pub use property_key::*;

mod realm;
pub use realm::*;

pub mod js_error;
pub use js_error::*;

#[derive(Collect)]
#[collect(no_drop)]
pub struct JsRoot<'gc> {
    pub realm: RealmPtr<'gc>,
}

pub type JsArena = gc_arena::Arena<gc_arena::Rootable!['gc => JsRoot<'gc>]>;

/// Host-side owner of one engine instance: the arena holding every value,
/// the realm with its job queue, and the rejection tracker.
///
/// Values never leave [`Runtime::mutate`]; anything that must survive
/// between calls is stored as a global binding on the realm.
pub struct Runtime {
    arena: JsArena,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_hooks(config, Rc::new(DefaultHostHooks))
    }

    pub fn with_hooks(config: RuntimeConfig, hooks: Rc<dyn HostHooks>) -> Self {
        let arena = JsArena::new(|mc| JsRoot {
            realm: new_realm(mc, config, hooks),
        });
        Runtime { arena }
    }

    /// Run `f` with access to the realm. Jobs enqueued by `f` stay queued
    /// until [`Runtime::run_jobs`] (or [`crate::run_jobs`] from inside `f`).
    pub fn mutate<F, R>(&self, f: F) -> R
    where
        F: for<'gc> FnOnce(&MutationContext<'gc>, &RealmPtr<'gc>) -> R,
    {
        self.arena.mutate(|mc, root| f(mc, &root.realm))
    }

    /// Drain the job queue to completion, then let the collector catch up.
    /// Returns the number of jobs executed.
    pub fn run_jobs(&mut self) -> Result<usize, JSError> {
        let result = self.arena.mutate(|mc, root| crate::js_job_queue::run_jobs(mc, &root.realm));
        self.arena.collect_debt();
        result
    }

    pub fn pending_jobs(&self) -> usize {
        self.arena.mutate(|_mc, root| crate::js_job_queue::pending_job_count(&root.realm))
    }

    /// Rendered reasons of rejections reported as unhandled since the last call.
    pub fn take_unhandled_rejections(&self) -> Vec<String> {
        self.arena
            .mutate(|mc, root| std::mem::take(&mut root.realm.borrow_mut(mc).rejections.unhandled))
    }

    pub fn collect_all(&mut self) {
        self.arena.collect_all();
    }
}
