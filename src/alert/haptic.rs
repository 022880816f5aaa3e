use serde::Serialize;

/// Vibration pattern attached to an alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticPattern {
    /// Triple rapid pulse.
    Urgent,
    /// Double pulse.
    Warning,
    /// Single pulse.
    Info,
}

const URGENT_WAVEFORM: &[u64] = &[0, 100, 50, 100, 50, 100];
const WARNING_WAVEFORM: &[u64] = &[0, 200, 100, 200];
const INFO_WAVEFORM: &[u64] = &[0, 150];

impl HapticPattern {
    pub fn for_tier(tier: u8) -> Self {
        match tier {
            0 | 1 => HapticPattern::Urgent,
            2 | 3 => HapticPattern::Warning,
            _ => HapticPattern::Info,
        }
    }

    /// Alternating off/on durations in milliseconds, starting with a delay.
    pub fn waveform_ms(&self) -> &'static [u64] {
        match self {
            HapticPattern::Urgent => URGENT_WAVEFORM,
            HapticPattern::Warning => WARNING_WAVEFORM,
            HapticPattern::Info => INFO_WAVEFORM,
        }
    }

    pub fn pulses(&self) -> usize {
        self.waveform_ms().len() / 2
    }
}
