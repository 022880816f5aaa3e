/// Minimum spacing between processed frames.
#[derive(Clone, Debug)]
pub struct FrameGate {
    min_interval_ms: u64,
    last: Option<u64>,
}

impl FrameGate {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last: None,
        }
    }

    /// Admit a frame arriving at `now_ms`, recording it when admitted.
    pub fn try_admit(&mut self, now_ms: u64) -> bool {
        let admit = match self.last {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.min_interval_ms,
        };
        if admit {
            self.last = Some(now_ms);
        }
        admit
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_frames_inside_interval() {
        let mut gate = FrameGate::new(250);
        assert!(gate.try_admit(1_000));
        assert!(!gate.try_admit(1_100));
        assert!(!gate.try_admit(1_249));
        assert!(gate.try_admit(1_250));
        // Dropped frames do not move the window.
        assert!(!gate.try_admit(1_300));
        assert!(gate.try_admit(1_500));
    }

    #[test]
    fn zero_interval_admits_everything() {
        let mut gate = FrameGate::new(0);
        assert!(gate.try_admit(5));
        assert!(gate.try_admit(5));
    }

    #[test]
    fn reset_reopens_the_gate() {
        let mut gate = FrameGate::new(1_000);
        assert!(gate.try_admit(0));
        gate.reset();
        assert!(gate.try_admit(10));
    }
}
