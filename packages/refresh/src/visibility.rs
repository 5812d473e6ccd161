//! Foreground/background signal for the display surface.
//!
//! The tracker counts transitions alongside the current flag. A subscriber
//! that wakes after a hide-then-show burst sees the same `visible` value but
//! a larger transition count, so it can still react to both edges.

use tokio::sync::watch;

/// Current visibility plus the number of edges observed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub visible: bool,
    pub transitions: u64,
}

/// Owner side of the visibility signal.
#[derive(Debug)]
pub struct VisibilityTracker {
    tx: watch::Sender<Visibility>,
}

impl VisibilityTracker {
    #[must_use]
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(Visibility {
            visible,
            transitions: 0,
        });
        Self { tx }
    }

    /// Records a new visibility state. Returns `true` if it was an edge;
    /// repeated reports of the current state are ignored.
    pub fn set_visible(&self, visible: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if current.visible == visible {
                return false;
            }
            current.visible = visible;
            current.transitions += 1;
            true
        });
        if changed {
            log::debug!("Surface is now {}", if visible { "visible" } else { "hidden" });
        }
        changed
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.tx.borrow().visible
    }

    #[must_use]
    pub fn subscribe(&self) -> VisibilitySignal {
        VisibilitySignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the visibility signal.
#[derive(Debug, Clone)]
pub struct VisibilitySignal {
    rx: watch::Receiver<Visibility>,
}

impl VisibilitySignal {
    /// The latest state, marking it as seen.
    pub fn current(&mut self) -> Visibility {
        *self.rx.borrow_and_update()
    }

    /// The latest state without marking it as seen.
    #[must_use]
    pub fn peek(&self) -> Visibility {
        *self.rx.borrow()
    }

    /// Waits for the next edge. Returns `None` once the tracker is dropped.
    pub async fn changed(&mut self) -> Option<Visibility> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
