pub(crate) mod core;
pub(crate) mod error;
pub(crate) mod js_array;
pub(crate) mod js_function;
pub(crate) mod js_iterator;
pub(crate) mod js_job_queue;
pub(crate) mod js_object;
pub(crate) mod js_promise;
pub(crate) mod js_promise_combinators;

pub use core::{
    Collect, DefaultHostHooks, EvalError, Gc, GcPtr, HostHooks, JSObjectData, JSObjectDataPtr, JSPromise, JSPromisePtr, MutationContext,
    ObjectClass, PromiseReaction, PromiseState, PropertyKey, ReactionKind, RealmPtr, Runtime, RuntimeConfig, Value, WellKnownSymbol,
    create_aggregate_error, create_error, error_name, get_global, is_error, new_js_object_data, same_value, set_global, to_boolean,
    value_to_json, value_to_string,
};
pub use error::JSError;
pub use js_array::{array_elements, create_array};
pub use js_function::{call_function, new_host_function};
pub use js_iterator::create_iter_result_object;
pub use js_job_queue::{Job, PollResult, enqueue_job, pending_job_count, poll_jobs, queue_microtask, run_jobs};
pub use js_object::{create_object, define_accessor, get_property, has_property, object_set_key_value, set_property};
pub use js_promise::{
    PromiseWithResolvers, ResolvingFunctions, construct_promise, create_resolving_functions, fulfill_promise, initialize_promise, new_promise,
    perform_promise_then, promise_catch, promise_finally, promise_reject, promise_resolve, promise_then, promise_try,
    promise_with_resolvers, reject_promise, resolve_promise,
};
pub use js_promise_combinators::{promise_all, promise_all_settled, promise_any, promise_race};
