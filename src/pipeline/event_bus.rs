// src/pipeline/event_bus.rs
//
// In-process hazard sink. Records what the pipeline asked the output
// channels to do, so hosts without speech or haptics (the simulation,
// tests) can inspect and log it.

use crate::detection::ProbeMark;
use crate::host::HazardSink;
use crate::types::{HapticCue, HazardCategory};
use std::collections::VecDeque;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    HazardEmitted {
        category: HazardCategory,
        haptic: HapticCue,
        alert_tone: bool,
        phrase: &'static str,
    },

    Announcement(String),

    Narrative(String),

    ProbeMarks(Vec<ProbeMark>),
}

pub struct EventBus {
    events: VecDeque<PipelineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: PipelineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    /// Hazards emitted since the last drain, in order
    pub fn emitted(&self) -> Vec<HazardCategory> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::HazardEmitted { category, .. } => Some(*category),
                _ => None,
            })
            .collect()
    }
}

impl HazardSink for EventBus {
    fn emit(&mut self, category: HazardCategory) {
        info!(
            "🚨 {} → {:?}{} \"{}\"",
            category,
            category.haptic(),
            if category.plays_alert_tone() { " + tone" } else { "" },
            category.announcement()
        );
        self.publish(PipelineEvent::HazardEmitted {
            category,
            haptic: category.haptic(),
            alert_tone: category.plays_alert_tone(),
            phrase: category.announcement(),
        });
    }

    fn announce(&mut self, text: &str) {
        info!("🔊 {}", text);
        self.publish(PipelineEvent::Announcement(text.to_string()));
    }

    fn show_debug(&mut self, narrative: &str) {
        self.publish(PipelineEvent::Narrative(narrative.to_string()));
    }

    fn show_probe_marks(&mut self, marks: &[ProbeMark]) {
        self.publish(PipelineEvent::ProbeMarks(marks.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_oldest_when_full() {
        let mut bus = EventBus::new(2);
        bus.announce("one");
        bus.announce("two");
        bus.announce("three");

        let events = bus.drain();
        assert_eq!(
            events,
            vec![
                PipelineEvent::Announcement("two".to_string()),
                PipelineEvent::Announcement("three".to_string()),
            ]
        );
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_emit_carries_feedback_cues() {
        let mut bus = EventBus::new(8);
        bus.emit(HazardCategory::DropOff);
        bus.show_debug("Baseline N/A\n");
        bus.emit(HazardCategory::Obstacle);

        assert_eq!(bus.emitted(), vec![HazardCategory::DropOff, HazardCategory::Obstacle]);
        match &bus.drain()[0] {
            PipelineEvent::HazardEmitted {
                haptic, alert_tone, phrase, ..
            } => {
                assert_eq!(*haptic, HapticCue::ErrorNotification);
                assert!(*alert_tone);
                assert_eq!(*phrase, "Drop-off ahead");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
