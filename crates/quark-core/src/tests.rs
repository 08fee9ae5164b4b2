#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::*;

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn test_burst_runs_render_once() {
        let rt = Runtime::new();
        let a = signal(1);
        let b = signal(2);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let render = Computation::render(&rt, "sum", {
            let (a, b, seen) = (a.clone(), b.clone(), seen.clone());
            move |rt| {
                seen.borrow_mut().push((a.get(rt), b.get(rt)));
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();

        rt.batch(|| -> Result<()> {
            a.set(&rt, 10)?;
            b.set(&rt, 20)?;
            a.set(&rt, 11)?;
            Ok(())
        })
        .unwrap()
        .unwrap();

        assert_eq!(*seen.borrow(), vec![(1, 2), (11, 20)]);
    }

    #[test]
    fn test_unbatched_writes_are_separate_bursts() {
        let rt = Runtime::new();
        let a = signal(0);
        let runs = counter();
        let render = Computation::render(&rt, "probe", {
            let (a, runs) = (a.clone(), runs.clone());
            move |rt| {
                a.get(rt);
                runs.set(runs.get() + 1);
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();

        a.set(&rt, 1).unwrap();
        a.set(&rt, 2).unwrap();
        // unchanged value: no notification at all
        a.set(&rt, 2).unwrap();
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_nested_batches_flush_once() {
        let rt = Runtime::new();
        let s = signal(0);
        let runs = counter();
        let render = Computation::render(&rt, "probe", {
            let (s, runs) = (s.clone(), runs.clone());
            move |rt| {
                s.get(rt);
                runs.set(runs.get() + 1);
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();

        rt.batch(|| {
            s.set(&rt, 1).unwrap();
            rt.batch(|| s.set(&rt, 2).unwrap()).unwrap();
            assert!(rt.is_batching());
            assert_eq!(runs.get(), 1);
        })
        .unwrap();

        assert_eq!(runs.get(), 2);
        assert!(!rt.is_batching());
    }

    #[test]
    fn test_panicking_batch_still_closes() {
        let rt = Runtime::new();
        let s = signal(0);
        let runs = counter();
        let render = Computation::render(&rt, "probe", {
            let (s, runs) = (s.clone(), runs.clone());
            move |rt| {
                s.get(rt);
                runs.set(runs.get() + 1);
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();

        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            rt.batch(|| {
                s.set(&rt, 1).unwrap();
                panic!("boom");
            })
        }));
        assert!(caught.is_err());
        assert!(!rt.is_batching());

        s.set(&rt, 2).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_computed_is_lazy() {
        let rt = Runtime::new();
        let base = signal(2);
        let calls = counter();
        let doubled = Computed::new(&rt, "doubled", {
            let (base, calls) = (base.clone(), calls.clone());
            move |rt| {
                calls.set(calls.get() + 1);
                Ok(base.get(rt) * 2)
            }
        });

        assert_eq!(calls.get(), 0);
        assert_eq!(doubled.get(&rt).unwrap(), 4);
        assert_eq!(doubled.get(&rt).unwrap(), 4);
        assert_eq!(calls.get(), 1);

        base.set(&rt, 5).unwrap();
        assert_eq!(calls.get(), 1);
        assert!(doubled.is_dirty(&rt));
        assert_eq!(doubled.peek(), Some(4));

        assert_eq!(doubled.get(&rt).unwrap(), 10);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_computed_failure_stays_dirty() {
        let rt = Runtime::new();
        let s = signal(0);
        let checked = Computed::new(&rt, "checked", {
            let s = s.clone();
            move |rt| {
                let v = s.get(rt);
                anyhow::ensure!(v >= 0, "negative input {v}");
                Ok(v)
            }
        });
        assert_eq!(checked.get(&rt).unwrap(), 0);

        s.set(&rt, -1).unwrap();
        let err = checked.get(&rt).unwrap_err();
        assert_eq!(err.label(), "checked");
        assert!(checked.is_dirty(&rt));
        assert_eq!(rt.depth(), 0);

        s.set(&rt, 4).unwrap();
        assert_eq!(checked.get(&rt).unwrap(), 4);
    }

    #[test]
    fn test_render_recovers_after_computed_failure() {
        let rt = Runtime::new();
        let s = signal(1);
        let checked = Rc::new(Computed::new(&rt, "checked", {
            let s = s.clone();
            move |rt| {
                let v = s.get(rt);
                anyhow::ensure!(v != 0, "zero input");
                Ok(v * 10)
            }
        }));
        let runs = counter();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let render = Computation::render(&rt, "render", {
            let (checked, runs, seen) = (checked.clone(), runs.clone(), seen.clone());
            move |rt| {
                runs.set(runs.get() + 1);
                seen.borrow_mut().push(checked.get(rt)?);
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();

        let err = s.set(&rt, 0).unwrap_err();
        assert_eq!(err.label(), "render");
        assert_eq!(runs.get(), 2);

        s.set(&rt, 5).unwrap();
        assert_eq!(runs.get(), 3);
        assert_eq!(*seen.borrow(), vec![10, 50]);

        // and again after a second failure
        assert!(s.set(&rt, 0).is_err());
        s.set(&rt, 7).unwrap();
        assert_eq!(runs.get(), 5);
        assert_eq!(*seen.borrow(), vec![10, 50, 70]);
    }

    #[test]
    fn test_watcher_recovers_after_computed_failure() {
        let rt = Runtime::new();
        let s = signal(2);
        let half = Rc::new(Computed::new(&rt, "half", {
            let s = s.clone();
            move |rt| {
                let v = s.get(rt);
                anyhow::ensure!(v % 2 == 0, "odd input {v}");
                Ok(v / 2)
            }
        }));
        let calls = Rc::new(RefCell::new(Vec::new()));

        let _watcher = Watcher::new(
            &rt,
            "half",
            {
                let half = half.clone();
                move |rt: &Runtime| Ok(half.get(rt)?)
            },
            {
                let calls = calls.clone();
                move |_: &Runtime, new: &i32, old: Option<&i32>| {
                    calls.borrow_mut().push((*new, old.copied()));
                    Ok(())
                }
            },
            WatchOptions::default(),
        )
        .unwrap();

        assert!(s.set(&rt, 3).is_err());
        s.set(&rt, 8).unwrap();
        assert_eq!(*calls.borrow(), vec![(4, Some(1))]);
    }

    #[test]
    fn test_reads_register_with_innermost_only() {
        let rt = Runtime::new();
        let base = signal(1);
        let plus_one = Rc::new(Computed::new(&rt, "plus_one", {
            let base = base.clone();
            move |rt| Ok(base.get(rt) + 1)
        }));
        let seen = Rc::new(Cell::new(0));

        let render = Computation::render(&rt, "render", {
            let (plus_one, seen) = (plus_one.clone(), seen.clone());
            move |rt| {
                seen.set(plus_one.get(rt)?);
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();

        assert_eq!(seen.get(), 2);
        assert_eq!(base.dep().subscriber_count(&rt), 1);
        assert_eq!(render.sources(&rt).len(), 1);

        base.set(&rt, 5).unwrap();
        assert_eq!(seen.get(), 6);
    }

    #[test]
    fn test_dependencies_follow_the_branch_taken() {
        let rt = Runtime::new();
        let flag = signal(true);
        let left = signal("l");
        let right = signal("r");
        let runs = counter();

        let render = Computation::render(&rt, "branch", {
            let (flag, left, right, runs) =
                (flag.clone(), left.clone(), right.clone(), runs.clone());
            move |rt| {
                let _ = if flag.get(rt) { left.get(rt) } else { right.get(rt) };
                runs.set(runs.get() + 1);
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();
        assert_eq!(render.sources(&rt).len(), 2);
        assert_eq!(left.dep().subscriber_count(&rt), 1);
        assert_eq!(right.dep().subscriber_count(&rt), 0);

        flag.set(&rt, false).unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(left.dep().subscriber_count(&rt), 0);
        assert_eq!(right.dep().subscriber_count(&rt), 1);

        left.set(&rt, "L").unwrap();
        assert_eq!(runs.get(), 2);
        right.set(&rt, "R").unwrap();
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_notify_survives_subscriber_disposal() {
        let rt = Runtime::new();
        let s = signal(0);
        let victim_runs = counter();
        let slot: Rc<Cell<Option<Computation>>> = Rc::new(Cell::new(None));

        let killer = Computation::render(&rt, "killer", {
            let (s, slot) = (s.clone(), slot.clone());
            move |rt| {
                if s.get(rt) > 0
                    && let Some(victim) = slot.get()
                {
                    victim.dispose(rt);
                }
                Ok(())
            }
        });
        let victim = Computation::render(&rt, "victim", {
            let (s, victim_runs) = (s.clone(), victim_runs.clone());
            move |rt| {
                s.get(rt);
                victim_runs.set(victim_runs.get() + 1);
                Ok(())
            }
        });
        slot.set(Some(victim));
        killer.evaluate(&rt).unwrap();
        victim.evaluate(&rt).unwrap();
        assert_eq!(s.dep().subscriber_count(&rt), 2);

        s.set(&rt, 1).unwrap();
        assert_eq!(victim_runs.get(), 1);
        assert!(victim.is_disposed(&rt));
        assert_eq!(s.dep().subscriber_count(&rt), 1);
    }

    #[test]
    fn test_self_invalidation_is_deferred_not_recursive() {
        let rt = Runtime::new();
        let s = signal(0);
        let runs = counter();
        let render = Computation::render(&rt, "settle", {
            let (s, runs) = (s.clone(), runs.clone());
            move |rt| {
                let v = s.get(rt);
                runs.set(runs.get() + 1);
                assert_eq!(rt.depth(), 1);
                if v < 3 {
                    s.set(rt, v + 1)?;
                }
                Ok(())
            }
        });

        render.evaluate(&rt).unwrap();
        assert_eq!(s.get_untracked(), 3);
        assert_eq!(runs.get(), 4);
    }

    #[test]
    fn test_runaway_computation_hits_rerun_limit() {
        let rt = Runtime::with_config(RuntimeConfig {
            max_reruns: 5,
            ..RuntimeConfig::default()
        });
        let s = signal(0u32);
        let runs = counter();
        let render = Computation::render(&rt, "runaway", {
            let (s, runs) = (s.clone(), runs.clone());
            move |rt| {
                s.get(rt);
                runs.set(runs.get() + 1);
                s.update(rt, |v| *v += 1)?;
                Ok(())
            }
        });

        let err = render.evaluate(&rt).unwrap_err();
        assert!(matches!(err, Error::RerunLimit { limit: 5, .. }));
        assert_eq!(err.label(), "runaway");
        assert_eq!(runs.get(), 6);
        assert!(!rt.is_batching());
    }

    #[test]
    fn test_failure_does_not_block_other_subscribers() {
        let rt = Runtime::new();
        let s = signal(0);
        let healthy_runs = counter();

        let failing = Computation::render(&rt, "failing", {
            let s = s.clone();
            move |rt| {
                if s.get(rt) == 1 {
                    anyhow::bail!("boom");
                }
                Ok(())
            }
        });
        let healthy = Computation::render(&rt, "healthy", {
            let (s, healthy_runs) = (s.clone(), healthy_runs.clone());
            move |rt| {
                s.get(rt);
                healthy_runs.set(healthy_runs.get() + 1);
                Ok(())
            }
        });
        failing.evaluate(&rt).unwrap();
        healthy.evaluate(&rt).unwrap();

        let err = s.set(&rt, 1).unwrap_err();
        assert_eq!(err.label(), "failing");
        assert!(err.to_string().contains("boom"));
        assert_eq!(healthy_runs.get(), 2);
        assert_eq!(rt.depth(), 0);
        assert_eq!(rt.active(), None);
        // the failing run still re-subscribed to what it read before failing
        assert_eq!(s.dep().subscriber_count(&rt), 2);
    }

    #[test]
    fn test_watcher_immediate_and_changes() {
        let rt = Runtime::new();
        let s = signal(1);
        let log: Rc<RefCell<Vec<(i32, Option<i32>)>>> = Rc::new(RefCell::new(Vec::new()));

        let watcher = Watcher::new(
            &rt,
            "watch:s",
            {
                let s = s.clone();
                move |rt: &Runtime| Ok(s.get(rt))
            },
            {
                let log = log.clone();
                move |_: &Runtime, new: &i32, old: Option<&i32>| {
                    log.borrow_mut().push((*new, old.copied()));
                    Ok(())
                }
            },
            WatchOptions::default().immediate(true),
        )
        .unwrap();
        assert_eq!(*log.borrow(), vec![(1, None)]);

        s.set(&rt, 2).unwrap();
        assert_eq!(*log.borrow(), vec![(1, None), (2, Some(1))]);

        // forced notification with an equal value: no callback
        s.replace(&rt, 2).unwrap();
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(watcher.value(), Some(2));

        drop(watcher);
        s.set(&rt, 3).unwrap();
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(s.dep().subscriber_count(&rt), 0);
    }

    #[test]
    fn test_watcher_custom_equality() {
        let rt = Runtime::new();
        let s = signal(10);
        let fired = counter();
        let _watcher = Watcher::new(
            &rt,
            "watch:tens",
            {
                let s = s.clone();
                move |rt: &Runtime| Ok(s.get(rt))
            },
            {
                let fired = fired.clone();
                move |_: &Runtime, _: &i32, _: Option<&i32>| {
                    fired.set(fired.get() + 1);
                    Ok(())
                }
            },
            WatchOptions::default().equals(|a: &i32, b: &i32| a / 10 == b / 10),
        )
        .unwrap();

        s.set(&rt, 15).unwrap();
        assert_eq!(fired.get(), 0);
        s.set(&rt, 21).unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_watchers_run_before_later_renders() {
        let rt = Runtime::new();
        let s = signal(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let _watcher = Watcher::new(
            &rt,
            "watch",
            {
                let s = s.clone();
                move |rt: &Runtime| Ok(s.get(rt))
            },
            {
                let order = order.clone();
                move |_: &Runtime, _: &i32, _: Option<&i32>| {
                    order.borrow_mut().push("watch");
                    Ok(())
                }
            },
            WatchOptions::default(),
        )
        .unwrap();
        let render = Computation::render(&rt, "render", {
            let (s, order) = (s.clone(), order.clone());
            move |rt| {
                s.get(rt);
                order.borrow_mut().push("render");
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();
        order.borrow_mut().clear();

        s.set(&rt, 1).unwrap();
        assert_eq!(*order.borrow(), vec!["watch", "render"]);
    }

    #[test]
    fn test_untracked_reads_do_not_subscribe() {
        let rt = Runtime::new();
        let s = signal(0);
        let runs = counter();
        let render = Computation::render(&rt, "peek", {
            let (s, runs) = (s.clone(), runs.clone());
            move |rt| {
                let _ = rt.untrack(|| s.get(rt));
                runs.set(runs.get() + 1);
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();

        assert_eq!(s.dep().subscriber_count(&rt), 0);
        s.set(&rt, 1).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_scope_dispose_releases_subscriptions() {
        let rt = Runtime::new();
        let s = signal(0);
        let runs = counter();
        let cleaned_up = Rc::new(Cell::new(false));
        let scope = Scope::new();

        let render = Computation::render(&rt, "scoped", {
            let (s, runs) = (s.clone(), runs.clone());
            move |rt| {
                s.get(rt);
                runs.set(runs.get() + 1);
                Ok(())
            }
        });
        scope.adopt(&rt, render);
        scope.add_disposer({
            let cleaned_up = cleaned_up.clone();
            move || cleaned_up.set(true)
        });
        render.evaluate(&rt).unwrap();
        assert_eq!(rt.live_computations(), 1);

        scope.dispose(&rt);
        assert!(cleaned_up.get());
        assert!(render.is_disposed(&rt));
        assert_eq!(rt.live_computations(), 0);

        s.set(&rt, 1).unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(s.dep().subscriber_count(&rt), 0);
        assert!(matches!(render.evaluate(&rt), Err(Error::Disposed { .. })));
    }

    #[test]
    fn test_dropped_cell_leaves_no_dangling_source() {
        let rt = Runtime::new();
        let keep = signal(0);
        let transient = Rc::new(RefCell::new(Some(Dep::new())));

        let render = Computation::render(&rt, "mixed", {
            let (keep, transient) = (keep.clone(), transient.clone());
            move |rt| {
                keep.get(rt);
                if let Some(dep) = transient.borrow().as_ref() {
                    dep.depend(rt);
                }
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();
        assert_eq!(render.sources(&rt).len(), 2);

        transient.borrow_mut().take();
        assert_eq!(render.sources(&rt).len(), 1);
    }

    #[test]
    fn test_post_update_queue_runs_each_callback_once() {
        let queue = Rc::new(PostUpdateQueue::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        queue.push({
            let log = log.clone();
            move || log.borrow_mut().push("a")
        });
        queue.push({
            let (log, queue) = (log.clone(), queue.clone());
            move || {
                log.borrow_mut().push("b");
                let log = log.clone();
                queue.push(move || log.borrow_mut().push("c"));
            }
        });

        assert_eq!(queue.flush(), 2);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.flush(), 1);
        assert_eq!(queue.flush(), 0);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dispose_handle_runs_once() {
        let runs = counter();
        let d = Dispose::new({
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        });
        let scope = Scope::new();
        let d = d.bind(&scope);

        d.run();
        scope.dispose(&Runtime::new());
        d.run();
        assert_eq!(runs.get(), 1);
        assert!(d.is_spent());
    }

    #[test]
    fn test_observer_reports_kind_and_label() {
        let rt = Runtime::new();
        let s = signal(String::from("a"));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let obs = Computation::observer(&rt, "log", {
            let (s, seen) = (s.clone(), seen.clone());
            move |rt| {
                assert!(rt.is_tracking());
                s.with(rt, |v| seen.borrow_mut().push(v.clone()));
                Ok(())
            }
        });
        assert_eq!(obs.kind(&rt), Some(ComputationKind::Observer));
        assert_eq!(obs.label(&rt), "log");
        assert!(!rt.is_tracking());

        obs.evaluate(&rt).unwrap();
        s.set(&rt, "b".into()).unwrap();
        assert_eq!(*seen.borrow(), ["a", "b"]);

        obs.dispose(&rt);
        assert_eq!(obs.kind(&rt), None);
        assert!(obs.is_disposed(&rt));
    }

    #[test]
    fn test_invalidate_reaches_readers() {
        let rt = Runtime::new();
        let runs = counter();
        let c = Rc::new(Computed::new(&rt, "tick", {
            let runs = runs.clone();
            move |_rt| {
                runs.set(runs.get() + 1);
                Ok(runs.get())
            }
        }));
        assert_eq!(c.computation().kind(&rt), Some(ComputationKind::Computed));

        let reads = counter();
        let render = Computation::render(&rt, "reader", {
            let (c, reads) = (c.clone(), reads.clone());
            move |rt| {
                c.get(rt)?;
                reads.set(reads.get() + 1);
                Ok(())
            }
        });
        render.evaluate(&rt).unwrap();
        assert_eq!((runs.get(), reads.get()), (1, 1));

        c.invalidate(&rt).unwrap();
        assert_eq!((runs.get(), reads.get()), (2, 2));
        assert_eq!(c.peek(), Some(2));
    }

    #[test]
    fn test_child_scopes_dispose_before_parent() {
        let rt = Runtime::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let parent = Scope::new();
        let child = parent.child();
        parent.add_disposer({
            let order = order.clone();
            move || order.borrow_mut().push("parent")
        });
        child.add_disposer({
            let order = order.clone();
            move || order.borrow_mut().push("child")
        });

        let s = signal(0);
        let owned = Computation::render(&rt, "owned", {
            let s = s.clone();
            move |rt| {
                s.get(rt);
                Ok(())
            }
        });
        owned.evaluate(&rt).unwrap();
        child.adopt(&rt, owned);
        assert_eq!(child.len(), 1);

        parent.dispose(&rt);
        assert!(child.is_disposed());
        assert!(owned.is_disposed(&rt));
        assert_eq!(s.dep().subscriber_count(&rt), 0);
        assert_eq!(*order.borrow(), ["child", "parent"]);

        let late = Computation::render(&rt, "late", |_| Ok(()));
        parent.adopt(&rt, late);
        assert!(late.is_disposed(&rt));
        assert!(parent.child().is_disposed());
    }
}
