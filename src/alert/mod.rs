//! Turning ranked detections into navigation cues.

mod composer;
mod haptic;
mod scheduler;
mod spatial;

pub use composer::{Alert, AlertComposer};
pub use haptic::HapticPattern;
pub use scheduler::{AlertScheduler, CooldownKey};
pub use spatial::{
    Direction, DirectionScheme, Distance, DistanceThresholds, Placement, SpatialDescriber,
};
