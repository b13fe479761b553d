//! Front / flip / back / done sequencing.
//!
//! The sequencer is pure: it is fed ticks and detections together with the
//! current [`Instant`] and answers with what the coordinator should do, so the
//! timing rules can be exercised without a clock.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::card::{CardFields, CardPhase, CardScanState};
use crate::engine::{CardDetection, CardStatus, CardTargets};

/// Why a tick does no card work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardSkip {
    /// Waiting for the user to flip the card.
    Flipping,
    /// The scan is over.
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardTick {
    Process,
    Skip(CardSkip),
}

/// Engine reconfiguration requested by a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardAction {
    /// Restrict auto-capture to these fields.
    ResetAutoCapture(CardTargets),
    /// The scan is finished; drop the engine's result handler.
    ReleaseCallback,
}

#[derive(Debug)]
pub struct CardSequencer {
    state: CardScanState,
    flip_delay: Duration,
    back_targets: Option<CardTargets>,
}

impl CardSequencer {
    pub fn new(flip_delay: Duration) -> Self {
        Self {
            state: CardScanState::default(),
            flip_delay,
            back_targets: None,
        }
    }

    pub fn state(&self) -> &CardScanState {
        &self.state
    }

    pub fn phase(&self) -> CardPhase {
        self.state.phase
    }

    pub fn fields(&self) -> &CardFields {
        &self.state.fields
    }

    pub fn should_process(&self) -> bool {
        self.state.should_process
    }

    /// Decide whether this tick sends a frame to the card detector.
    pub fn on_tick(&mut self, now: Instant) -> CardTick {
        if !self.state.should_process {
            return CardTick::Skip(CardSkip::Finished);
        }
        if self.state.phase != CardPhase::FlipCard {
            return CardTick::Process;
        }
        let entered = *self.state.phase_entered_at.get_or_insert(now);
        if now.saturating_duration_since(entered) < self.flip_delay {
            return CardTick::Skip(CardSkip::Flipping);
        }
        self.enter(CardPhase::ScanningBack, None);
        info!("[EVENT] card_phase: ScanningBack");
        CardTick::Process
    }

    /// Fold one detector reading into the scan.
    pub fn on_detection(&mut self, detection: &CardDetection, now: Instant) -> Vec<CardAction> {
        let mut actions = Vec::new();
        if !self.state.should_process {
            return actions;
        }
        self.state.fields.merge(detection);
        self.state.status = Some(detection.status);

        match self.state.phase {
            CardPhase::ScanningFront => {
                if detection.status == CardStatus::Done {
                    self.state.status = None;
                    self.enter(CardPhase::FlipCard, Some(now));
                    info!("[EVENT] card_phase: FlipCard");
                    // The same reading also runs the back-side targeting.
                    self.scan_back(&mut actions);
                }
            }
            CardPhase::ScanningBack => self.scan_back(&mut actions),
            CardPhase::FlipCard | CardPhase::Done => {}
        }
        actions
    }

    /// Finish the scan with a forced reading.
    pub fn on_forced(&mut self, detection: &CardDetection) -> Vec<CardAction> {
        if !self.state.should_process {
            return Vec::new();
        }
        self.state.fields.merge(detection);
        self.finish();
        vec![CardAction::ReleaseCallback]
    }

    fn scan_back(&mut self, actions: &mut Vec<CardAction>) {
        let missing = self.state.fields.missing();
        if missing.any() && self.back_targets != Some(missing) {
            self.back_targets = Some(missing);
            actions.push(CardAction::ResetAutoCapture(missing));
        }
        // Completion only counts once the back is actually being scanned.
        if self.state.phase != CardPhase::ScanningBack {
            return;
        }
        if self.state.status == Some(CardStatus::Done) || !missing.any() {
            self.finish();
            actions.push(CardAction::ReleaseCallback);
        }
    }

    fn enter(&mut self, phase: CardPhase, at: Option<Instant>) {
        debug_assert!(phase >= self.state.phase);
        self.state.phase = phase;
        self.state.phase_entered_at = at;
    }

    fn finish(&mut self) {
        self.enter(CardPhase::Done, None);
        self.state.should_process = false;
        debug!("[EVENT] card_phase: Done fields={:?}", self.state.fields);
    }
}
