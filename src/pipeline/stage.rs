//! Pipeline states and the trail of states a run went through.

use std::fmt;

/// A pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    LockAcquired,
    AuxOn,
    Capturing,
    AuxOff,
    Transcoding,
    Notifying,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::LockAcquired => "lock-acquired",
            Stage::AuxOn => "aux-on",
            Stage::Capturing => "capturing",
            Stage::AuxOff => "aux-off",
            Stage::Transcoding => "transcoding",
            Stage::Notifying => "notifying",
            Stage::CleaningUp => "cleaning-up",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// States visited by one run, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTrail {
    stages: Vec<Stage>,
}

impl Default for StageTrail {
    fn default() -> Self {
        Self {
            stages: vec![Stage::Idle],
        }
    }
}

impl StageTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.current(), to = %stage, "Pipeline transition");
        self.stages.push(stage);
    }

    /// The most recent state.
    pub fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Idle)
    }

    pub fn into_vec(self) -> Vec<Stage> {
        self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_starts_idle() {
        let trail = StageTrail::new();
        assert_eq!(trail.current(), Stage::Idle);
        assert_eq!(trail.into_vec(), vec![Stage::Idle]);
    }

    #[test]
    fn test_trail_records_order() {
        let mut trail = StageTrail::new();
        trail.enter(Stage::LockAcquired);
        trail.enter(Stage::Capturing);
        assert_eq!(trail.current(), Stage::Capturing);
        assert_eq!(
            trail.into_vec(),
            vec![Stage::Idle, Stage::LockAcquired, Stage::Capturing]
        );
    }
}
