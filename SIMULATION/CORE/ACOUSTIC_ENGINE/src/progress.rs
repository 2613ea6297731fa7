//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: progress.rs | SIMULATION/CORE/ACOUSTIC_ENGINE/src/progress.rs
//! PURPOSE: One-way progress and snapshot bus between solver and subscribers
//! MODIFIED: 2026-07-18
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! The solver publishes; subscribers consume through bounded channels. The
//! bus never blocks the solver thread: a full subscriber loses the event,
//! and a subscriber that stays full for 32 consecutive events is dropped
//! entirely. Snapshots are f32 deep copies shared behind `Arc`, so one copy
//! serves every subscriber of an event.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::solver::SimulationResults;

/// Consecutive failed deliveries before a subscriber is dropped.
const MAX_CONSECUTIVE_FULL: u32 = 32;

/// Periodic progress payload.
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    /// Percent complete in [0, 99]
    pub percent: u8,
    pub step: u32,
    pub message: String,
    /// f32 copy of the vx field at this step
    pub vx: Arc<Vec<f32>>,
    /// f32 copy of the vy field at this step
    pub vy: Arc<Vec<f32>>,
}

/// Everything the solver emits.
#[derive(Clone, Debug)]
pub enum SolverEvent {
    Progress(ProgressEvent),
    Completed(SimulationResults),
}

struct Subscriber {
    tx: Sender<SolverEvent>,
    consecutive_full: u32,
}

/// Fan-out bus owned by the solver.
#[derive(Default)]
pub struct ProgressBus {
    subscribers: Vec<Subscriber>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with the given queue capacity.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<SolverEvent> {
        let (tx, rx) = bounded(capacity.max(1));
        self.subscribers.push(Subscriber {
            tx,
            consecutive_full: 0,
        });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every live subscriber without blocking.
    pub fn publish(&mut self, event: &SolverEvent) {
        self.subscribers.retain_mut(|sub| {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    sub.consecutive_full = 0;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    sub.consecutive_full += 1;
                    if sub.consecutive_full >= MAX_CONSECUTIVE_FULL {
                        warn!("dropping progress subscriber after {} missed events", sub.consecutive_full);
                        false
                    } else {
                        true
                    }
                }
                // Receiver is gone
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }
}

/// Piecewise completion estimate, clamped to [0, 99]:
/// - energy has peaked       -> 80 + 19·min(1, step/max_steps)
/// - receiver touched        -> 50 + 29·post_touch/max_post_steps
/// - still propagating       -> 49·min(1, step/expected_pre_touch_steps)
pub fn percent_complete(
    step: u32,
    max_steps: u32,
    expected_pre_touch_steps: u32,
    post_touch: Option<u32>,
    max_post_steps: u32,
    peaked: bool,
) -> u8 {
    let pct = if peaked {
        80.0 + 19.0 * (step as f64 / max_steps.max(1) as f64).min(1.0)
    } else if let Some(post) = post_touch {
        50.0 + 29.0 * (post as f64 / max_post_steps.max(1) as f64).min(1.0)
    } else {
        49.0 * (step as f64 / expected_pre_touch_steps.max(1) as f64).min(1.0)
    };
    pct.clamp(0.0, 99.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(step: u32) -> SolverEvent {
        SolverEvent::Progress(ProgressEvent {
            percent: 0,
            step,
            message: String::new(),
            vx: Arc::new(Vec::new()),
            vy: Arc::new(Vec::new()),
        })
    }

    #[test]
    fn test_percent_phases() {
        // Pre-touch ramps to 49
        assert_eq!(percent_complete(0, 500, 100, None, 500, false), 0);
        assert_eq!(percent_complete(50, 500, 100, None, 500, false), 24);
        assert_eq!(percent_complete(1000, 500, 100, None, 500, false), 49);
        // Touched ramps 50..79
        assert_eq!(percent_complete(120, 500, 100, Some(0), 500, false), 50);
        assert_eq!(percent_complete(620, 500, 100, Some(500), 500, false), 79);
        // Peaked ramps 80..99
        assert_eq!(percent_complete(0, 500, 100, Some(0), 500, true), 80);
        assert_eq!(percent_complete(500, 500, 100, Some(400), 500, true), 99);
    }

    #[test]
    fn test_full_subscriber_loses_events_not_connection() {
        let mut bus = ProgressBus::new();
        let rx = bus.subscribe(1);
        bus.publish(&progress(0));
        bus.publish(&progress(1)); // queue full, event lost
        assert_eq!(bus.subscriber_count(), 1);
        let got = rx.recv().unwrap();
        match got {
            SolverEvent::Progress(p) => assert_eq!(p.step, 0),
            _ => panic!("unexpected event"),
        }
    }

    #[test]
    fn test_chronically_full_subscriber_is_dropped() {
        let mut bus = ProgressBus::new();
        let _rx = bus.subscribe(1);
        for step in 0..(MAX_CONSECUTIVE_FULL + 2) {
            bus.publish(&progress(step));
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_disconnected_subscriber_is_removed() {
        let mut bus = ProgressBus::new();
        let rx = bus.subscribe(4);
        drop(rx);
        bus.publish(&progress(0));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
