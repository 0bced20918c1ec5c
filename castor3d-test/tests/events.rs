use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use castor3d::{types::EventType, CpuFrameEvent, FrameListener, GpuFrameEvent};
use castor3d_test::TestRunner;
use parking_lot::Mutex;

#[test]
fn nested_event_waits_for_next_fire() {
    let listener = Arc::new(FrameListener::new("nested"));
    let counter = Arc::new(AtomicUsize::new(0));

    let inner_listener = Arc::clone(&listener);
    let inner_counter = Arc::clone(&counter);
    listener.post_cpu_event(CpuFrameEvent::functor(EventType::PreRender, move || {
        let counter = Arc::clone(&inner_counter);
        inner_listener.post_cpu_event(CpuFrameEvent::functor(EventType::PreRender, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }));

    assert!(listener.fire_cpu_events(EventType::PreRender));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(listener.pending_count(EventType::PreRender), 1);

    assert!(listener.fire_cpu_events(EventType::PreRender));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn skipped_event_never_runs() {
    let listener = FrameListener::new("skip");
    let ran = Arc::new(AtomicUsize::new(0));

    let flag = Arc::clone(&ran);
    let handle = listener.post_cpu_event(CpuFrameEvent::functor(EventType::QueueRender, move || {
        flag.fetch_add(1, Ordering::SeqCst);
    }));
    handle.skip();

    let report = listener.run_cpu_events(EventType::QueueRender);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 1);
}

#[test]
fn concurrent_posts_all_run_once() {
    const THREADS: usize = 8;
    const EVENTS: usize = 250;

    let listener = Arc::new(FrameListener::new("threads"));
    let counter = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let listener = Arc::clone(&listener);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..EVENTS {
                    let counter = Arc::clone(&counter);
                    listener.post_cpu_event(CpuFrameEvent::functor(EventType::PostRender, move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let report = listener.run_cpu_events(EventType::PostRender);
    assert_eq!(report.applied, THREADS * EVENTS);
    assert_eq!(counter.load(Ordering::SeqCst), THREADS * EVENTS);
    assert_eq!(listener.run_cpu_events(EventType::PostRender).applied, 0);
}

#[test]
fn flush_discards_without_running() {
    let listener = FrameListener::new("flush");
    let ran = Arc::new(AtomicUsize::new(0));
    for ty in [EventType::PreRender, EventType::PostRender] {
        let ran = Arc::clone(&ran);
        listener.post_cpu_event(CpuFrameEvent::functor(ty, move || {
            ran.fetch_add(1, Ordering::SeqCst);
        }));
    }

    listener.flush_events(EventType::PreRender);
    assert_eq!(listener.pending_count(EventType::PreRender), 0);
    assert_eq!(listener.pending_count(EventType::PostRender), 1);

    listener.flush();
    assert_eq!(listener.run_cpu_events(EventType::PostRender).applied, 0);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_event_fails_the_batch_only() {
    let listener = FrameListener::new("panics");
    let ran = Arc::new(AtomicUsize::new(0));

    listener.post_cpu_event(CpuFrameEvent::functor(EventType::PreRender, || panic!("broken event")));
    let after = Arc::clone(&ran);
    listener.post_cpu_event(CpuFrameEvent::functor(EventType::PreRender, move || {
        after.fetch_add(1, Ordering::SeqCst);
    }));

    let report = listener.run_cpu_events(EventType::PreRender);
    assert!(!report.succeeded());
    assert_eq!(report.failed, 1);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn engine_runs_cpu_buckets_before_gpu_buckets() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().render_system("gl3").build()?;
    let order = Arc::new(Mutex::new(Vec::new()));
    let listener = runner.engine.default_listener();

    for ty in [EventType::PostRender, EventType::QueueRender, EventType::PreRender] {
        let gpu_order = Arc::clone(&order);
        listener.post_gpu_event(GpuFrameEvent::functor(ty, move |_| gpu_order.lock().push((ty, "gpu"))));
        let cpu_order = Arc::clone(&order);
        listener.post_cpu_event(CpuFrameEvent::functor(ty, move || cpu_order.lock().push((ty, "cpu"))));
    }

    let (statistics, _) = runner.render_frame();
    assert_eq!(statistics.events_fired, 6);
    assert_eq!(statistics.failed_batches, 0);
    assert_eq!(
        *order.lock(),
        [
            (EventType::PreRender, "cpu"),
            (EventType::PreRender, "gpu"),
            (EventType::QueueRender, "cpu"),
            (EventType::QueueRender, "gpu"),
            (EventType::PostRender, "cpu"),
            (EventType::PostRender, "gpu"),
        ]
    );
    Ok(())
}

#[test]
fn events_posted_by_a_frame_run_next_frame() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().render_system("gl3").build()?;
    let listener = runner.engine.default_listener();
    let counter = Arc::new(AtomicUsize::new(0));

    let poster = Arc::clone(&listener);
    let inner = Arc::clone(&counter);
    listener.post_cpu_event(CpuFrameEvent::functor(EventType::PostRender, move || {
        poster.post_cpu_event(CpuFrameEvent::functor(EventType::PostRender, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }));
    }));

    runner.render_frame();
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    runner.render_frame();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn cleanup_drops_pending_events() -> anyhow::Result<()> {
    let mut runner = TestRunner::builder().render_system("gl3").build()?;
    let ran = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&ran);
    runner
        .engine
        .default_listener()
        .post_cpu_event(CpuFrameEvent::functor(EventType::PreRender, move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));

    runner.engine.cleanup();
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(runner.engine.default_listener().pending_count(EventType::PreRender), 0);
    Ok(())
}
