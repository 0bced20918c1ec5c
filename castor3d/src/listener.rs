use std::{
    any::Any,
    mem,
    panic::{self, AssertUnwindSafe},
};

use castor3d_types::EventType;
use parking_lot::Mutex;

use crate::{
    backend::RenderSystem,
    event::{CpuFrameEvent, EventHandle, EventOrigin, GpuFrameEvent},
    util::typedefs::SsoString,
};

type Buckets<T> = [Vec<T>; EventType::COUNT];

/// What one fire call did.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FireReport {
    pub applied: usize,
    pub skipped: usize,
    /// Events that panicked. They are logged and the rest of the batch still
    /// runs.
    pub failed: usize,
}

impl FireReport {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl std::ops::AddAssign for FireReport {
    fn add_assign(&mut self, rhs: Self) {
        self.applied += rhs.applied;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non string panic payload>"
    }
}

/// Thread safe queue of pending frame events, one bucket per [`EventType`]
/// for CPU events and one for GPU events.
///
/// Firing swaps the bucket out under the lock and runs it without the lock,
/// so events posted while a bucket runs, including by the running events
/// themselves, wait for the next fire.
pub struct FrameListener {
    name: SsoString,
    capture_backtraces: bool,
    cpu: Mutex<Buckets<CpuFrameEvent>>,
    gpu: Mutex<Buckets<GpuFrameEvent>>,
}

impl FrameListener {
    pub fn new(name: impl Into<SsoString>) -> Self {
        Self {
            name: name.into(),
            capture_backtraces: false,
            cpu: Mutex::new(Default::default()),
            gpu: Mutex::new(Default::default()),
        }
    }

    /// Captures a backtrace for every posted event even without
    /// `RUST_BACKTRACE`. Only has an effect in debug builds.
    pub fn with_backtraces(mut self, capture: bool) -> Self {
        self.capture_backtraces = capture;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post_cpu_event(&self, mut event: CpuFrameEvent) -> EventHandle {
        event.set_origin(EventOrigin::capture(self.capture_backtraces));
        let handle = event.handle();
        self.cpu.lock()[event.ty().index()].push(event);
        handle
    }

    pub fn post_gpu_event(&self, mut event: GpuFrameEvent) -> EventHandle {
        event.set_origin(EventOrigin::capture(self.capture_backtraces));
        let handle = event.handle();
        self.gpu.lock()[event.ty().index()].push(event);
        handle
    }

    /// Runs every CPU event posted for `ty`, in post order. Returns false if
    /// any of them panicked.
    pub fn fire_cpu_events(&self, ty: EventType) -> bool {
        self.run_cpu_events(ty).succeeded()
    }

    /// Runs every GPU event posted for `ty`, in post order. Returns false if
    /// any of them panicked.
    pub fn fire_gpu_events(&self, ty: EventType, render_system: &mut dyn RenderSystem) -> bool {
        self.run_gpu_events(ty, render_system).succeeded()
    }

    pub fn run_cpu_events(&self, ty: EventType) -> FireReport {
        profiling::scope!("FrameListener::fire_cpu_events");

        let events = mem::take(&mut self.cpu.lock()[ty.index()]);
        let mut report = FireReport::default();
        for event in events {
            let origin = event.origin().clone();
            match panic::catch_unwind(AssertUnwindSafe(|| event.apply())) {
                Ok(true) => report.applied += 1,
                Ok(false) => report.skipped += 1,
                Err(payload) => {
                    report.failed += 1;
                    self.log_failure("CPU", ty, &origin, &*payload);
                }
            }
        }
        report
    }

    pub fn run_gpu_events(&self, ty: EventType, render_system: &mut dyn RenderSystem) -> FireReport {
        profiling::scope!("FrameListener::fire_gpu_events");

        let events = mem::take(&mut self.gpu.lock()[ty.index()]);
        let mut report = FireReport::default();
        for event in events {
            let origin = event.origin().clone();
            match panic::catch_unwind(AssertUnwindSafe(|| event.apply(&mut *render_system))) {
                Ok(true) => report.applied += 1,
                Ok(false) => report.skipped += 1,
                Err(payload) => {
                    report.failed += 1;
                    self.log_failure("GPU", ty, &origin, &*payload);
                }
            }
        }
        report
    }

    fn log_failure(&self, side: &str, ty: EventType, origin: &EventOrigin, payload: &(dyn Any + Send)) {
        match origin.backtrace() {
            Some(backtrace) => log::error!(
                "Listener {:?}: {} {:?} event panicked: {}\nPosted from:\n{}",
                self.name,
                side,
                ty,
                panic_message(payload),
                backtrace
            ),
            None => log::error!(
                "Listener {:?}: {} {:?} event panicked: {}",
                self.name,
                side,
                ty,
                panic_message(payload)
            ),
        }
    }

    /// Discards every pending event of one type without running it.
    pub fn flush_events(&self, ty: EventType) {
        let cpu = mem::take(&mut self.cpu.lock()[ty.index()]);
        let gpu = mem::take(&mut self.gpu.lock()[ty.index()]);
        if !cpu.is_empty() || !gpu.is_empty() {
            log::debug!(
                "Listener {:?} discarding {} CPU and {} GPU {:?} events",
                self.name,
                cpu.len(),
                gpu.len(),
                ty
            );
        }
    }

    /// Discards every pending event without running it.
    pub fn flush(&self) {
        for ty in EventType::ARRAY {
            self.flush_events(ty);
        }
    }

    pub fn pending_count(&self, ty: EventType) -> usize {
        self.cpu.lock()[ty.index()].len() + self.gpu.lock()[ty.index()].len()
    }
}

impl std::fmt::Debug for FrameListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameListener").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Drop for FrameListener {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use castor3d_types::EventType;

    use super::FrameListener;
    use crate::event::CpuFrameEvent;

    fn counting(ty: EventType, counter: &Arc<AtomicUsize>) -> CpuFrameEvent {
        let counter = Arc::clone(counter);
        CpuFrameEvent::functor(ty, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn buckets_are_separate() {
        let listener = FrameListener::new("test");
        let counter = Arc::new(AtomicUsize::new(0));
        listener.post_cpu_event(counting(EventType::PostRender, &counter));

        assert!(listener.fire_cpu_events(EventType::PreRender));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(listener.pending_count(EventType::PostRender), 1);

        assert!(listener.fire_cpu_events(EventType::PostRender));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_is_contained() {
        let listener = FrameListener::new("test");
        let counter = Arc::new(AtomicUsize::new(0));
        listener.post_cpu_event(CpuFrameEvent::functor(EventType::PreRender, || panic!("boom")));
        listener.post_cpu_event(counting(EventType::PreRender, &counter));

        let report = listener.run_cpu_events(EventType::PreRender);
        assert_eq!(report.failed, 1);
        assert_eq!(report.applied, 1);
        assert!(!report.succeeded());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn flush_discards() {
        let listener = FrameListener::new("test");
        let counter = Arc::new(AtomicUsize::new(0));
        listener.post_cpu_event(counting(EventType::QueueRender, &counter));
        listener.flush();
        assert!(listener.fire_cpu_events(EventType::QueueRender));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
