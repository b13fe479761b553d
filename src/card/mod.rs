//! # Card Scanning
//!
//! Payment card capture runs in four phases: the front is scanned, the user
//! gets time to flip the card, the back is scanned for whatever fields are
//! still missing, and the sequence ends. Field values accumulate across
//! frames and are never cleared by a later empty reading.

pub mod sequencer;

use std::time::Instant;

use serde::Serialize;

use crate::engine::{CardDetection, CardStatus, CardTargets};

pub use sequencer::{CardAction, CardSequencer, CardSkip, CardTick};

/// Phase of a card scan. Phases only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CardPhase {
    ScanningFront,
    FlipCard,
    ScanningBack,
    Done,
}

/// Card fields read so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CardFields {
    pub number: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub cvv: Option<String>,
}

fn merge_field(slot: &mut Option<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

impl CardFields {
    /// Take every non-empty value from `detection`; empty values never
    /// overwrite what is already known.
    pub fn merge(&mut self, detection: &CardDetection) {
        merge_field(&mut self.number, &detection.number);
        merge_field(&mut self.name, &detection.name);
        merge_field(&mut self.date, &detection.date);
        merge_field(&mut self.cvv, &detection.cvv);
    }

    /// Fields still to be found, as auto-capture targets.
    pub fn missing(&self) -> CardTargets {
        CardTargets {
            number: self.number.is_none(),
            name: self.name.is_none(),
            date: self.date.is_none(),
            cvv: self.cvv.is_none(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.missing().any()
    }
}

/// Live state of one card scan.
#[derive(Clone, Debug)]
pub struct CardScanState {
    pub phase: CardPhase,
    pub fields: CardFields,
    /// Last status reported by the detector, cleared on the front-to-flip transition.
    pub status: Option<CardStatus>,
    /// When the current timed phase started.
    pub phase_entered_at: Option<Instant>,
    /// False once the scan is finished; checked before any per-frame work.
    pub should_process: bool,
}

impl Default for CardScanState {
    fn default() -> Self {
        Self {
            phase: CardPhase::ScanningFront,
            fields: CardFields::default(),
            status: None,
            phase_entered_at: None,
            should_process: true,
        }
    }
}
