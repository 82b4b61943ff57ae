use js_promise::*;
use std::cell::RefCell;
use std::rc::Rc;

// Initialize logger for this integration test binary so `RUST_LOG` is honored.
// Using `ctor` ensures initialization runs before tests start.
#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

type Log = Rc<RefCell<Vec<String>>>;

fn push_tag<'gc>(mc: &MutationContext<'gc>, log: &Log, tag: &str) -> Value<'gc> {
    let log = log.clone();
    let tag = tag.to_string();
    new_host_function(mc, "push", Value::Undefined, move |_mc, _realm, _this, args, _data| {
        let rendered: Vec<String> = args.iter().map(value_to_string).collect();
        log.borrow_mut().push(format!("{}({})", tag, rendered.join(",")));
        Ok(Value::Undefined)
    })
}

/// Callback that queues a fresh copy of itself every time it runs.
fn spinner<'gc>(mc: &MutationContext<'gc>) -> Value<'gc> {
    new_host_function(mc, "spin", Value::Undefined, |mc, realm, _this, _args, _data| {
        queue_microtask(mc, realm, spinner(mc), vec![]);
        Ok(Value::Undefined)
    })
}

#[cfg(test)]
mod job_queue_tests {
    use super::*;

    #[test]
    fn test_run_jobs_on_empty_queue() {
        let mut rt = Runtime::new();
        assert_eq!(rt.pending_jobs(), 0);
        assert_eq!(rt.run_jobs().unwrap(), 0);
    }

    #[test]
    fn test_callbacks_run_fifo_with_arguments() {
        let log: Log = Rc::default();
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            queue_microtask(mc, realm, push_tag(mc, &log, "a"), vec![Value::Number(1.0)]);
            queue_microtask(mc, realm, push_tag(mc, &log, "b"), vec![Value::string("x"), Value::Boolean(true)]);
            queue_microtask(mc, realm, push_tag(mc, &log, "c"), vec![]);
        });
        assert_eq!(rt.pending_jobs(), 3);
        assert!(log.borrow().is_empty());
        assert_eq!(rt.run_jobs().unwrap(), 3);
        assert_eq!(*log.borrow(), vec!["a(1)", "b(x,true)", "c()"]);
        assert_eq!(rt.pending_jobs(), 0);
    }

    #[test]
    fn test_poll_jobs_runs_one_job_at_a_time() {
        let log: Log = Rc::default();
        let rt = Runtime::new();
        rt.mutate(|mc, realm| {
            queue_microtask(mc, realm, push_tag(mc, &log, "a"), vec![]);
            queue_microtask(mc, realm, push_tag(mc, &log, "b"), vec![]);
        });
        assert_eq!(rt.mutate(|mc, realm| poll_jobs(mc, realm)), PollResult::Executed);
        assert_eq!(*log.borrow(), vec!["a()"]);
        assert_eq!(rt.pending_jobs(), 1);
        assert_eq!(rt.mutate(|mc, realm| poll_jobs(mc, realm)), PollResult::Executed);
        assert_eq!(rt.mutate(|mc, realm| poll_jobs(mc, realm)), PollResult::Empty);
        assert_eq!(*log.borrow(), vec!["a()", "b()"]);
    }

    #[test]
    fn test_jobs_queued_while_draining_run_in_same_drain() {
        let log: Log = Rc::default();
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let inner = push_tag(mc, &log, "inner");
            let outer = new_host_function(mc, "outer", inner, |mc, realm, _this, _args, data| {
                queue_microtask(mc, realm, data.clone(), vec![]);
                Ok(Value::Undefined)
            });
            queue_microtask(mc, realm, outer, vec![]);
            queue_microtask(mc, realm, push_tag(mc, &log, "second"), vec![]);
        });
        assert_eq!(rt.run_jobs().unwrap(), 3);
        assert_eq!(*log.borrow(), vec!["second()", "inner()"]);
    }

    #[test]
    fn test_promise_jobs_and_callbacks_share_one_queue() {
        let log: Log = Rc::default();
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            queue_microtask(mc, realm, push_tag(mc, &log, "first"), vec![]);
            let p = promise_resolve(mc, realm, Value::Number(2.0));
            promise_then(mc, realm, &p, &push_tag(mc, &log, "then"), &Value::Undefined);
            queue_microtask(mc, realm, push_tag(mc, &log, "last"), vec![]);
        });
        rt.run_jobs().unwrap();
        assert_eq!(*log.borrow(), vec!["first()", "then(2)", "last()"]);
    }

    #[test]
    fn test_nested_drain_is_a_noop() {
        let log: Log = Rc::default();
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let sink = log.clone();
            let reenter = new_host_function(mc, "reenter", Value::Undefined, move |mc, realm, _this, _args, _data| {
                let nested = run_jobs(mc, realm);
                sink.borrow_mut().push(format!("nested={:?}", nested));
                Ok(Value::Undefined)
            });
            queue_microtask(mc, realm, reenter, vec![]);
            queue_microtask(mc, realm, push_tag(mc, &log, "after"), vec![]);
        });
        assert_eq!(rt.run_jobs().unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["nested=Ok(0)", "after()"]);
    }

    #[test]
    fn test_throwing_callback_does_not_stop_drain() {
        let log: Log = Rc::default();
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let bad = new_host_function(mc, "bad", Value::Undefined, |_mc, _realm, _this, _args, _data| {
                Err(EvalError::Throw(Value::string("callback failed")))
            });
            queue_microtask(mc, realm, bad, vec![]);
            queue_microtask(mc, realm, Value::Number(3.0), vec![]);
            queue_microtask(mc, realm, push_tag(mc, &log, "still runs"), vec![]);
        });
        assert_eq!(rt.run_jobs().unwrap(), 3);
        assert_eq!(*log.borrow(), vec!["still runs()"]);
    }

    #[test]
    fn test_runaway_queue_hits_job_limit() {
        let mut rt = Runtime::with_config(RuntimeConfig {
            max_jobs_per_drain: Some(10),
            ..RuntimeConfig::default()
        });
        rt.mutate(|mc, realm| {
            queue_microtask(mc, realm, spinner(mc), vec![]);
        });
        assert_eq!(rt.run_jobs(), Err(JSError::InfiniteLoopError { iterations: 10 }));
        assert_eq!(rt.pending_jobs(), 1);
        // The next drain picks up where the last one stopped.
        assert!(rt.run_jobs().is_err());
    }

    #[test]
    fn test_job_limit_not_hit_when_queue_empties_exactly() {
        let log: Log = Rc::default();
        let mut rt = Runtime::with_config(RuntimeConfig {
            max_jobs_per_drain: Some(2),
            ..RuntimeConfig::default()
        });
        rt.mutate(|mc, realm| {
            queue_microtask(mc, realm, push_tag(mc, &log, "one"), vec![]);
            queue_microtask(mc, realm, push_tag(mc, &log, "two"), vec![]);
        });
        assert_eq!(rt.run_jobs(), Ok(2));
    }

    #[test]
    fn test_long_promise_chain_drains() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let increment = new_host_function(mc, "inc", Value::Undefined, |_mc, _realm, _this, args, _data| match args.first() {
                Some(Value::Number(n)) => Ok(Value::Number(n + 1.0)),
                _ => Ok(Value::Number(f64::NAN)),
            });
            let mut p = promise_resolve(mc, realm, Value::Number(0.0));
            for _ in 0..500 {
                p = promise_then(mc, realm, &p, &increment, &Value::Undefined);
            }
            set_global(mc, realm, "last", Value::Promise(p));
        });
        assert_eq!(rt.run_jobs().unwrap(), 500);
        rt.collect_all();
        let result = rt.mutate(|_mc, realm| get_global(realm, "last").as_promise().map(|p| value_to_string(&p.borrow().result())));
        assert_eq!(result.as_deref(), Some("500"));
    }
}
