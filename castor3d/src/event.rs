//! Deferred units of work, applied at a fixed point of the render loop.
//!
//! Events are posted to a [`FrameListener`](crate::FrameListener) from any
//! thread and run on the thread that owns the render system. CPU events see
//! nothing but their own captures; GPU events also get the render system.

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use castor3d_types::EventType;
use parking_lot::Mutex;

use crate::backend::RenderSystem;

/// Something holding render system objects, created and destroyed through
/// frame events.
pub trait GpuResource: Send {
    /// Creates the objects. Returns false on failure, which is only logged.
    fn initialise(&mut self, render_system: &mut dyn RenderSystem) -> bool;
    fn cleanup(&mut self, render_system: &mut dyn RenderSystem);
}

/// Something releasing CPU side state through a frame event.
pub trait CpuResource: Send {
    fn cleanup(&mut self);
}

/// Cancels a posted event. Cheap to clone and to send to other threads.
#[derive(Debug, Clone, Default)]
pub struct EventHandle(Arc<AtomicBool>);

impl EventHandle {
    /// Makes the event a no-op. Has no effect if it already ran, and might
    /// not take effect if it is running right now.
    pub fn skip(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_skipped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn capture_backtrace(force: bool) -> Option<Arc<Backtrace>> {
    if !cfg!(debug_assertions) {
        return None;
    }
    let backtrace = if force {
        Backtrace::force_capture()
    } else {
        Backtrace::capture()
    };
    match backtrace.status() {
        BacktraceStatus::Captured => Some(Arc::new(backtrace)),
        _ => None,
    }
}

/// Where an event was posted from. Empty unless backtraces are enabled in a
/// debug build.
#[derive(Clone, Default)]
pub struct EventOrigin {
    backtrace: Option<Arc<Backtrace>>,
}

impl EventOrigin {
    pub(crate) fn capture(force: bool) -> Self {
        Self {
            backtrace: capture_backtrace(force),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }
}

impl fmt::Debug for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backtrace {
            Some(backtrace) => write!(f, "{}", backtrace),
            None => f.write_str("<no backtrace>"),
        }
    }
}

type CpuFunctor = Box<dyn FnOnce() + Send>;
type GpuFunctor = Box<dyn FnOnce(&mut dyn RenderSystem) + Send>;

/// Event run on the CPU, before the matching GPU bucket.
pub struct CpuFrameEvent {
    ty: EventType,
    skip: EventHandle,
    origin: EventOrigin,
    functor: CpuFunctor,
}

impl CpuFrameEvent {
    pub fn functor<F>(ty: EventType, functor: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            ty,
            skip: EventHandle::default(),
            origin: EventOrigin::default(),
            functor: Box::new(functor),
        }
    }

    /// Calls [`CpuResource::cleanup`] on the shared resource.
    pub fn cleanup<R>(ty: EventType, resource: Arc<Mutex<R>>) -> Self
    where
        R: CpuResource + 'static,
    {
        Self::functor(ty, move || resource.lock().cleanup())
    }

    pub fn ty(&self) -> EventType {
        self.ty
    }

    pub fn handle(&self) -> EventHandle {
        self.skip.clone()
    }

    pub fn origin(&self) -> &EventOrigin {
        &self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: EventOrigin) {
        self.origin = origin;
    }

    /// Runs the event unless it was skipped. Returns whether it ran.
    pub fn apply(self) -> bool {
        if self.skip.is_skipped() {
            return false;
        }
        (self.functor)();
        true
    }
}

impl fmt::Debug for CpuFrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuFrameEvent")
            .field("ty", &self.ty)
            .field("skipped", &self.skip.is_skipped())
            .finish_non_exhaustive()
    }
}

/// Event run with the render system current.
pub struct GpuFrameEvent {
    ty: EventType,
    skip: EventHandle,
    origin: EventOrigin,
    functor: GpuFunctor,
}

impl GpuFrameEvent {
    pub fn functor<F>(ty: EventType, functor: F) -> Self
    where
        F: FnOnce(&mut dyn RenderSystem) + Send + 'static,
    {
        Self {
            ty,
            skip: EventHandle::default(),
            origin: EventOrigin::default(),
            functor: Box::new(functor),
        }
    }

    /// Calls [`GpuResource::initialise`] on the shared resource.
    pub fn initialise<R>(ty: EventType, resource: Arc<Mutex<R>>) -> Self
    where
        R: GpuResource + 'static,
    {
        Self::functor(ty, move |render_system| {
            if !resource.lock().initialise(render_system) {
                log::warn!("Gpu resource initialisation failed");
            }
        })
    }

    /// Calls [`GpuResource::cleanup`] on the shared resource.
    pub fn cleanup<R>(ty: EventType, resource: Arc<Mutex<R>>) -> Self
    where
        R: GpuResource + 'static,
    {
        Self::functor(ty, move |render_system| resource.lock().cleanup(render_system))
    }

    pub fn ty(&self) -> EventType {
        self.ty
    }

    pub fn handle(&self) -> EventHandle {
        self.skip.clone()
    }

    pub fn origin(&self) -> &EventOrigin {
        &self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: EventOrigin) {
        self.origin = origin;
    }

    pub fn apply(self, render_system: &mut dyn RenderSystem) -> bool {
        if self.skip.is_skipped() {
            return false;
        }
        (self.functor)(render_system);
        true
    }
}

impl fmt::Debug for GpuFrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuFrameEvent")
            .field("ty", &self.ty)
            .field("skipped", &self.skip.is_skipped())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use castor3d_types::EventType;

    use super::CpuFrameEvent;

    #[test]
    fn skipped_event_does_nothing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = Arc::clone(&counter);
        let event = CpuFrameEvent::functor(EventType::PreRender, move || {
            counter2.fetch_add(1, Ordering::Relaxed);
        });
        event.handle().skip();
        assert!(!event.apply());
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
