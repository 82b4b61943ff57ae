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

fn arg<'gc>(args: &[Value<'gc>], i: usize) -> Value<'gc> {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

fn recorder<'gc>(mc: &MutationContext<'gc>, log: &Log, tag: &str) -> Value<'gc> {
    let log = log.clone();
    let tag = tag.to_string();
    new_host_function(mc, "recorder", Value::Undefined, move |_mc, _realm, _this, args, _data| {
        log.borrow_mut().push(format!("{}:{}", tag, value_to_string(&arg(args, 0))));
        Ok(Value::Undefined)
    })
}

/// `{ then(resolve, reject) { resolve(data) } }`
fn thenable_resolving_with<'gc>(mc: &MutationContext<'gc>, value: Value<'gc>) -> Value<'gc> {
    let then = new_host_function(mc, "then", value, |mc, realm, _this, args, data| {
        call_function(mc, realm, &arg(args, 0), &Value::Undefined, &[data.clone()])
    });
    Value::Object(create_object(mc, vec![("then", then)]))
}

fn state_of(rt: &Runtime, name: &str) -> (&'static str, String) {
    rt.mutate(|_mc, realm| match get_global(realm, name).as_promise() {
        Some(p) => {
            let p = p.borrow();
            let state = match p.state() {
                PromiseState::Pending => "pending",
                PromiseState::Fulfilled(_) => "fulfilled",
                PromiseState::Rejected(_) => "rejected",
            };
            (state, value_to_string(&p.result()))
        }
        None => ("missing", String::new()),
    })
}

/// Handler that swallows its argument.
fn noop<'gc>(mc: &MutationContext<'gc>) -> Value<'gc> {
    new_host_function(mc, "noop", Value::Undefined, |_mc, _realm, _this, _args, _data| Ok(Value::Undefined))
}

#[cfg(test)]
mod promise_resolution_tests {
    use super::*;

    #[test]
    fn test_self_resolution_rejects_with_type_error() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let wr = promise_with_resolvers(mc);
            call_function(mc, realm, &wr.resolve, &Value::Undefined, &[Value::Promise(wr.promise)]).unwrap();
            promise_catch(mc, realm, &wr.promise, &noop(mc));
            set_global(mc, realm, "p", Value::Promise(wr.promise));
        });
        rt.run_jobs().unwrap();
        assert_eq!(
            state_of(&rt, "p"),
            ("rejected", "TypeError: Chaining cycle detected for promise #<Promise>".to_string())
        );
        let name = rt.mutate(|_mc, realm| {
            let p = get_global(realm, "p").as_promise().unwrap();
            let reason = p.borrow().result();
            error_name(&reason)
        });
        assert_eq!(name.as_deref(), Some("TypeError"));
    }

    #[test]
    fn test_thenable_is_adopted_in_a_later_job() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let thenable = thenable_resolving_with(mc, Value::Number(42.0));
            let p = new_promise(mc);
            resolve_promise(mc, realm, &p, thenable);
            set_global(mc, realm, "p", Value::Promise(p));
        });
        assert_eq!(state_of(&rt, "p").0, "pending");
        assert_eq!(rt.pending_jobs(), 1);
        rt.run_jobs().unwrap();
        assert_eq!(state_of(&rt, "p"), ("fulfilled", "42".to_string()));
    }

    #[test]
    fn test_nested_thenables_are_flattened() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let inner = thenable_resolving_with(mc, Value::string("deep"));
            let outer = thenable_resolving_with(mc, inner);
            let p = promise_resolve(mc, realm, outer);
            set_global(mc, realm, "p", Value::Promise(p));
        });
        rt.run_jobs().unwrap();
        assert_eq!(state_of(&rt, "p"), ("fulfilled", "deep".to_string()));
    }

    #[test]
    fn test_resolving_with_native_promise_takes_extra_hops() {
        let log: Log = Rc::default();
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let inner = promise_resolve(mc, realm, Value::string("a"));
            let a = new_promise(mc);
            resolve_promise(mc, realm, &a, Value::Promise(inner));
            promise_then(mc, realm, &a, &recorder(mc, &log, "a"), &Value::Undefined);

            let b = promise_resolve(mc, realm, Value::string("b"));
            let b1 = promise_then(mc, realm, &b, &recorder(mc, &log, "b1"), &Value::Undefined);
            promise_then(mc, realm, &b1, &recorder(mc, &log, "b2"), &Value::Undefined);
        });
        rt.run_jobs().unwrap();
        assert_eq!(*log.borrow(), vec!["b1:b", "b2:undefined", "a:a"]);
    }

    #[test]
    fn test_throwing_then_getter_rejects_synchronously() {
        let rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let obj = create_object(mc, vec![]);
            let getter = new_host_function(mc, "get then", Value::Undefined, |_mc, _realm, _this, _args, _data| {
                Err(EvalError::Throw(Value::string("getter boom")))
            });
            define_accessor(mc, &obj, "then", Some(getter), None);
            let p = new_promise(mc);
            resolve_promise(mc, realm, &p, Value::Object(obj));
            promise_catch(mc, realm, &p, &noop(mc));
            set_global(mc, realm, "p", Value::Promise(p));
        });
        assert_eq!(state_of(&rt, "p"), ("rejected", "getter boom".to_string()));
    }

    #[test]
    fn test_then_getter_is_read_once() {
        let reads: Log = Rc::default();
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let obj = create_object(mc, vec![]);
            let counted = reads.clone();
            let getter = new_host_function(mc, "get then", Value::Undefined, move |mc, _realm, _this, _args, _data| {
                counted.borrow_mut().push("read".to_string());
                Ok(new_host_function(mc, "then", Value::Undefined, |mc, realm, _this, args, _data| {
                    call_function(mc, realm, &arg(args, 0), &Value::Undefined, &[Value::Number(1.0)])
                }))
            });
            define_accessor(mc, &obj, "then", Some(getter), None);
            let p = promise_resolve(mc, realm, Value::Object(obj));
            set_global(mc, realm, "p", Value::Promise(p));
        });
        rt.run_jobs().unwrap();
        assert_eq!(reads.borrow().len(), 1);
        assert_eq!(state_of(&rt, "p"), ("fulfilled", "1".to_string()));
    }

    #[test]
    fn test_thenable_first_call_wins() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let then = new_host_function(mc, "then", Value::Undefined, |mc, realm, _this, args, _data| {
                let (resolve, reject) = (arg(args, 0), arg(args, 1));
                call_function(mc, realm, &resolve, &Value::Undefined, &[Value::string("first")])?;
                call_function(mc, realm, &reject, &Value::Undefined, &[Value::string("second")])?;
                Err(EvalError::Throw(Value::string("third")))
            });
            let thenable = Value::Object(create_object(mc, vec![("then", then)]));
            let p = promise_resolve(mc, realm, thenable);
            set_global(mc, realm, "p", Value::Promise(p));
        });
        rt.run_jobs().unwrap();
        assert_eq!(state_of(&rt, "p"), ("fulfilled", "first".to_string()));
    }

    #[test]
    fn test_thenable_throwing_before_resolving_rejects() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let then = new_host_function(mc, "then", Value::Undefined, |_mc, _realm, _this, _args, _data| {
                Err(EvalError::Js(JSError::TypeError {
                    message: "then exploded".to_string(),
                }))
            });
            let thenable = Value::Object(create_object(mc, vec![("then", then)]));
            let p = promise_resolve(mc, realm, thenable);
            promise_catch(mc, realm, &p, &noop(mc));
            set_global(mc, realm, "p", Value::Promise(p));
        });
        rt.run_jobs().unwrap();
        assert_eq!(state_of(&rt, "p"), ("rejected", "TypeError: then exploded".to_string()));
    }

    #[test]
    fn test_then_receives_thenable_as_this() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let then = new_host_function(mc, "then", Value::Undefined, |mc, realm, this, args, _data| {
                let tag = get_property(mc, realm, this, "tag")?;
                call_function(mc, realm, &arg(args, 0), &Value::Undefined, &[tag])
            });
            let thenable = Value::Object(create_object(mc, vec![("tag", Value::string("me")), ("then", then)]));
            let p = promise_resolve(mc, realm, thenable);
            set_global(mc, realm, "p", Value::Promise(p));
        });
        rt.run_jobs().unwrap();
        assert_eq!(state_of(&rt, "p"), ("fulfilled", "me".to_string()));
    }

    #[test]
    fn test_non_callable_then_fulfills_with_object() {
        let rt = Runtime::new();
        let out = rt.mutate(|mc, realm| {
            let obj = create_object(mc, vec![("then", Value::Number(5.0))]);
            let p = promise_resolve(mc, realm, Value::Object(obj));
            let p = p.borrow();
            let same = matches!(p.state(), PromiseState::Fulfilled(Value::Object(o)) if Gc::ptr_eq(*o, obj));
            (p.is_fulfilled(), same)
        });
        assert_eq!(out, (true, true));
    }

    #[test]
    fn test_primitives_fulfill_immediately() {
        let rt = Runtime::new();
        let states = rt.mutate(|mc, realm| {
            [Value::Undefined, Value::Null, Value::Boolean(true), Value::string("s"), Value::Number(f64::NAN)]
                .into_iter()
                .map(|v| {
                    let p = new_promise(mc);
                    resolve_promise(mc, realm, &p, v);
                    let p = p.borrow();
                    (p.is_fulfilled(), value_to_string(&p.result()))
                })
                .collect::<Vec<_>>()
        });
        let rendered: Vec<String> = states.iter().map(|(ok, s)| format!("{ok}:{s}")).collect();
        assert_eq!(rendered, vec!["true:undefined", "true:null", "true:true", "true:s", "true:NaN"]);
    }

    #[test]
    fn test_resolve_on_settled_promise_is_noop() {
        let rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let p = promise_resolve(mc, realm, Value::Number(1.0));
            resolve_promise(mc, realm, &p, Value::Number(2.0));
            reject_promise(mc, realm, &p, Value::Number(3.0));
            set_global(mc, realm, "p", Value::Promise(p));
        });
        assert_eq!(state_of(&rt, "p"), ("fulfilled", "1".to_string()));
    }
}
