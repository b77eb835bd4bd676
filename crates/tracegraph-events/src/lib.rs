use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracegraph_core::{ExecutionTrace, GraphStructure};

/// Input to a graph viewer.
///
/// Pointer and wheel coordinates are relative to the viewer's container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Pointer
    PointerDown {
        x: f32,
        y: f32,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    PointerUp,
    PointerLeave,
    Wheel {
        delta_y: f32,
        x: f32,
        y: f32,
    },

    // Toolbar
    ZoomIn,
    ZoomOut,
    ResetView,

    // Container
    ContainerResized {
        width: f32,
        height: f32,
    },

    // Data
    #[serde(skip)]
    GraphLoaded(Arc<GraphStructure>),
    #[serde(skip)]
    TraceLoaded(Option<Arc<ExecutionTrace>>),

    // Lifecycle
    Unmount,
}

impl Event {
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Event::PointerDown { .. }
                | Event::PointerMove { .. }
                | Event::PointerUp
                | Event::PointerLeave
                | Event::Wheel { .. }
        )
    }
}

pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event dropped: bus has no receivers");
        }
    }

    /// Dispatch all pending events to a listener.
    /// Call this from the UI loop; listeners run on the calling thread.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) -> usize {
        let mut count = 0;
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
            count += 1;
        }
        count
    }
}

/// Trait for components that respond to viewer events.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}
