use crate::core::{
    Collect, GcCell, GcPtr, GcTrace, GcWeak, JSObjectDataPtr, JSPromise, JSPromisePtr, MutationContext, Value, new_gc_cell_ptr,
    value_to_string,
};
use crate::js_job_queue::Job;
use std::collections::VecDeque;
use std::rc::Rc;

pub type RealmPtr<'gc> = GcPtr<'gc, Realm<'gc>>;

/// Runtime knobs carried by a realm.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Stop a single drain after this many jobs and report an
    /// `InfiniteLoopError`; remaining jobs stay queued.
    pub max_jobs_per_drain: Option<usize>,
    /// Record rejections without handlers and report them at the end of
    /// the outermost drain.
    pub track_unhandled_rejections: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_jobs_per_drain: None,
            track_unhandled_rejections: true,
        }
    }
}

/// Callbacks the embedding host can observe. Both methods have defaults, so
/// a host only overrides what it needs.
pub trait HostHooks {
    /// A promise was rejected and still had no handler when the job queue drained.
    fn unhandled_rejection<'gc>(&self, _mc: &MutationContext<'gc>, promise: JSPromisePtr<'gc>, reason: &Value<'gc>) {
        log::warn!("Uncaught (in promise): {} [promise id={}]", value_to_string(reason), promise.borrow().id);
    }

    /// A handler was attached to a promise previously reported as unhandled.
    fn rejection_handled<'gc>(&self, _mc: &MutationContext<'gc>, promise: JSPromisePtr<'gc>) {
        log::debug!("rejection handled late for promise id={}", promise.borrow().id);
    }
}

pub struct DefaultHostHooks;

impl HostHooks for DefaultHostHooks {}

#[derive(Clone, Copy, Collect)]
#[collect(no_drop)]
pub struct Intrinsics<'gc> {
    pub promise_constructor: JSObjectDataPtr<'gc>,
    pub promise_prototype: JSObjectDataPtr<'gc>,
}

#[derive(Default, Collect)]
#[collect(no_drop)]
pub struct RejectionTracker<'gc> {
    /// Rejected while unhandled; examined at the next checkpoint.
    pub candidates: Vec<JSPromisePtr<'gc>>,
    /// Already reported to the host; weak so reporting does not keep them alive.
    pub reported: Vec<GcWeak<'gc, GcCell<JSPromise<'gc>>>>,
    /// Rendered reasons of reported rejections, drained by the host.
    pub unhandled: Vec<String>,
}

pub struct Realm<'gc> {
    pub jobs: VecDeque<Job<'gc>>,
    pub rejections: RejectionTracker<'gc>,
    pub globals: indexmap::IndexMap<String, Value<'gc>>,
    pub intrinsics: Intrinsics<'gc>,
    pub config: RuntimeConfig,
    pub hooks: Rc<dyn HostHooks>,
    /// Set while the queue is being drained; nested drains return immediately.
    pub draining: bool,
}

unsafe impl<'gc> Collect<'gc> for Realm<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        for job in &self.jobs {
            job.trace(cc);
        }
        self.rejections.trace(cc);
        for v in self.globals.values() {
            v.trace(cc);
        }
        self.intrinsics.trace(cc);
    }
}

/// Allocate a realm with its Promise intrinsics installed and the global
/// `Promise` binding registered.
pub fn new_realm<'gc>(mc: &MutationContext<'gc>, config: RuntimeConfig, hooks: Rc<dyn HostHooks>) -> RealmPtr<'gc> {
    let intrinsics = crate::js_promise::create_promise_intrinsics(mc);
    let realm = new_gc_cell_ptr(
        mc,
        Realm {
            jobs: VecDeque::new(),
            rejections: RejectionTracker::default(),
            globals: indexmap::IndexMap::new(),
            intrinsics,
            config,
            hooks,
            draining: false,
        },
    );
    crate::js_promise::initialize_promise(mc, &realm);
    realm
}

pub fn set_global<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, name: &str, value: Value<'gc>) {
    realm.borrow_mut(mc).globals.insert(name.to_string(), value);
}

pub fn get_global<'gc>(realm: &RealmPtr<'gc>, name: &str) -> Value<'gc> {
    realm.borrow().globals.get(name).cloned().unwrap_or(Value::Undefined)
}
