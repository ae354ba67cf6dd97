//! Merges keyboard state from several local keyboards and the peer board.

use deskswitch_proto::KeyboardReport;

/// Local keyboard slots.
pub const MAX_DEVICES: usize = 3;

/// Per-source keyboard reports and their union.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyboardAggregator {
    local: [KeyboardReport; MAX_DEVICES],
    /// Highest local slot ever written.
    max_index: usize,
    remote: KeyboardReport,
}

impl KeyboardAggregator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            local: [KeyboardReport::EMPTY; MAX_DEVICES],
            max_index: 0,
            remote: KeyboardReport::EMPTY,
        }
    }

    /// Replace the report for local keyboard `index`.
    ///
    /// Returns `false` and changes nothing if `index` is out of range.
    pub fn update_local(&mut self, index: usize, report: &KeyboardReport) -> bool {
        let Some(slot) = self.local.get_mut(index) else {
            return false;
        };
        *slot = *report;
        self.max_index = self.max_index.max(index);
        true
    }

    /// Replace the combined report received from the peer.
    pub fn update_remote(&mut self, report: &KeyboardReport) {
        self.remote = *report;
    }

    /// Union of every local slot (in index order) followed by the remote one.
    ///
    /// Modifiers are OR'd. Key codes keep first-seen order, appear at most
    /// once, and anything past the report's capacity is dropped.
    #[must_use]
    pub fn combine(&self) -> KeyboardReport {
        let mut combined = KeyboardReport::EMPTY;
        let sources = self.local[..=self.max_index]
            .iter()
            .chain(core::iter::once(&self.remote));

        for source in sources {
            combined.modifier |= source.modifier;
            for &key in &source.keycodes {
                combined.press(key);
            }
        }
        combined
    }

    /// Zero every local slot and the remote slot.
    pub fn clear(&mut self) {
        self.local = [KeyboardReport::EMPTY; MAX_DEVICES];
        self.remote = KeyboardReport::EMPTY;
    }

    #[must_use]
    pub fn local(&self, index: usize) -> Option<&KeyboardReport> {
        self.local.get(index)
    }

    #[must_use]
    pub fn remote(&self) -> &KeyboardReport {
        &self.remote
    }
}
