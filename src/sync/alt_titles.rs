//! Alternative-title reconciliation between the editor and the catalog
//!
//! The editor keeps two states: titles the user is editing locally and
//! titles last confirmed by the catalog. Both carry a version drawn from one
//! monotonic counter, so deciding which state wins is a comparison instead
//! of a pair of "internal update" / "external update" flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One alternative title in several languages (`{"bo": "...", "en": "..."}`)
pub type LocalizedTitle = BTreeMap<String, String>;

/// A versioned set of alternative titles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedTitles {
    pub version: u64,
    pub titles: Vec<LocalizedTitle>,
}

/// Result of offering an external update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalUpdate {
    /// Adopted as both confirmed and local state
    Applied,
    /// Identical to the confirmed state
    Unchanged,
    /// Local edits are pending; they win until flushed and acknowledged
    Deferred,
}

/// Two-state alternative-title synchronisation
#[derive(Debug, Clone, Default)]
pub struct AltTitlesSync {
    counter: u64,
    local: VersionedTitles,
    confirmed: VersionedTitles,
    /// Version sent and awaiting acknowledgement
    in_flight: Option<VersionedTitles>,
}

impl AltTitlesSync {
    /// Start from titles already stored in the catalog
    pub fn new(initial: Vec<LocalizedTitle>) -> Self {
        let confirmed = VersionedTitles {
            version: 0,
            titles: initial,
        };
        Self {
            counter: 0,
            local: confirmed.clone(),
            confirmed,
            in_flight: None,
        }
    }

    /// Record a local edit
    pub fn edit(&mut self, titles: Vec<LocalizedTitle>) -> u64 {
        self.counter += 1;
        self.local = VersionedTitles {
            version: self.counter,
            titles,
        };
        self.counter
    }

    /// Local edits newer than the confirmed state exist
    pub fn has_pending(&self) -> bool {
        self.local.version > self.confirmed.version
    }

    /// Titles to send upstream, if any local edit has not been sent yet
    pub fn outgoing(&mut self) -> Option<VersionedTitles> {
        if !self.has_pending() {
            return None;
        }
        if self
            .in_flight
            .as_ref()
            .is_some_and(|sent| sent.version == self.local.version)
        {
            return None;
        }
        let outgoing = self.local.clone();
        self.in_flight = Some(outgoing.clone());
        Some(outgoing)
    }

    /// The catalog accepted the titles sent at `version`
    ///
    /// Acknowledgements for versions older than the confirmed state are
    /// ignored. Returns whether the confirmed state moved.
    pub fn acknowledge(&mut self, version: u64) -> bool {
        if version <= self.confirmed.version {
            return false;
        }
        match self.in_flight.take() {
            Some(sent) if sent.version == version => {
                self.confirmed = sent;
                true
            }
            other => {
                self.in_flight = other;
                false
            }
        }
    }

    /// The send of `version` failed; the next [`outgoing`](Self::outgoing)
    /// offers the local titles again
    pub fn release(&mut self, version: u64) {
        if self.in_flight.as_ref().is_some_and(|sent| sent.version == version) {
            self.in_flight = None;
        }
    }

    /// Offer titles that changed outside this editor
    pub fn receive_external(&mut self, titles: Vec<LocalizedTitle>) -> ExternalUpdate {
        if self.has_pending() {
            tracing::debug!(
                local_version = self.local.version,
                "Deferring external alternative titles; local edits pending"
            );
            return ExternalUpdate::Deferred;
        }
        if titles == self.confirmed.titles {
            return ExternalUpdate::Unchanged;
        }

        self.counter += 1;
        let external = VersionedTitles {
            version: self.counter,
            titles,
        };
        self.confirmed = external.clone();
        self.local = external;
        ExternalUpdate::Applied
    }

    /// Titles the editor should display
    pub fn view(&self) -> &[LocalizedTitle] {
        &self.local.titles
    }

    pub fn confirmed(&self) -> &VersionedTitles {
        &self.confirmed
    }

    pub fn local(&self) -> &VersionedTitles {
        &self.local
    }
}
