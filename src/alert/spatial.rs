//! Geometry to words: horizontal direction bucket and a coarse distance bucket.
//!
//! Distance is approximated from apparent size. No depth information is used.

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::error::{PipelineError, PipelineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    FarLeft,
    Left,
    Center,
    Right,
    FarRight,
}

impl Direction {
    /// Spoken form, suitable after the object name ("chair ... to your left").
    pub fn phrase(&self) -> &'static str {
        match self {
            Direction::FarLeft => "to your far left",
            Direction::Left => "to your left",
            Direction::Center => "ahead",
            Direction::Right => "to your right",
            Direction::FarRight => "to your far right",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::FarLeft => "far-left",
            Direction::Left => "left",
            Direction::Center => "center",
            Direction::Right => "right",
            Direction::FarRight => "far-right",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionScheme {
    /// Fifths of the frame width.
    #[default]
    FiveWay,
    /// Left of 0.3, right of 0.7, ahead otherwise.
    ThreeWay,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Distance {
    VeryClose,
    Nearby,
    InTheDistance,
    FarAway,
}

impl Distance {
    pub fn phrase(&self) -> &'static str {
        match self {
            Distance::VeryClose => "very close",
            Distance::Nearby => "nearby",
            Distance::InTheDistance => "in the distance",
            Distance::FarAway => "far away",
        }
    }
}

/// Relative-size cut points for the distance buckets. Each bucket applies when
/// `relative_size` is strictly greater than its threshold.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct DistanceThresholds {
    pub very_close: f32,
    pub nearby: f32,
    pub in_the_distance: f32,
}

impl Default for DistanceThresholds {
    fn default() -> Self {
        Self {
            very_close: 0.5,
            nearby: 0.25,
            in_the_distance: 0.10,
        }
    }
}

impl DistanceThresholds {
    pub fn validate(&self) -> PipelineResult<()> {
        let ordered = self.very_close <= 1.0
            && self.very_close > self.nearby
            && self.nearby > self.in_the_distance
            && self.in_the_distance >= 0.0;
        if ordered {
            Ok(())
        } else {
            Err(PipelineError::configuration(format!(
                "distance thresholds must satisfy 1 >= very_close > nearby > in_the_distance >= 0, got {:?}",
                self
            )))
        }
    }

    pub fn classify(&self, relative_size: f32) -> Distance {
        if relative_size > self.very_close {
            Distance::VeryClose
        } else if relative_size > self.nearby {
            Distance::Nearby
        } else if relative_size > self.in_the_distance {
            Distance::InTheDistance
        } else {
            Distance::FarAway
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub direction: Direction,
    pub distance: Distance,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SpatialDescriber {
    scheme: DirectionScheme,
    distance: DistanceThresholds,
}

impl SpatialDescriber {
    pub fn new(scheme: DirectionScheme, distance: DistanceThresholds) -> Self {
        Self { scheme, distance }
    }

    pub fn scheme(&self) -> DirectionScheme {
        self.scheme
    }

    pub fn describe(&self, detection: &Detection, frame_width: u32) -> Placement {
        self.describe_with(detection, frame_width, None)
    }

    /// Like [`describe`](Self::describe), with per-tier distance thresholds
    /// taking precedence over the describer's defaults.
    pub fn describe_with(
        &self,
        detection: &Detection,
        frame_width: u32,
        distance: Option<&DistanceThresholds>,
    ) -> Placement {
        Placement {
            direction: self.direction(detection.center_x(), frame_width),
            distance: distance
                .unwrap_or(&self.distance)
                .classify(detection.relative_size()),
        }
    }

    pub fn direction(&self, center_x: f32, frame_width: u32) -> Direction {
        let rel = if frame_width == 0 {
            0.5
        } else {
            (center_x / frame_width as f32).clamp(0.0, 1.0)
        };
        match self.scheme {
            DirectionScheme::FiveWay => {
                if rel < 0.2 {
                    Direction::FarLeft
                } else if rel < 0.4 {
                    Direction::Left
                } else if rel < 0.6 {
                    Direction::Center
                } else if rel < 0.8 {
                    Direction::Right
                } else {
                    Direction::FarRight
                }
            }
            DirectionScheme::ThreeWay => {
                if rel < 0.3 {
                    Direction::Left
                } else if rel > 0.7 {
                    Direction::Right
                } else {
                    Direction::Center
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(left: f32, right: f32, top: f32, bottom: f32) -> Detection {
        Detection::new("chair", 56, 0.8, BoundingBox::new(left, top, right, bottom), 100, 100)
            .unwrap()
    }

    #[test]
    fn five_way_buckets() {
        let d = SpatialDescriber::default();
        assert_eq!(d.direction(5.0, 100), Direction::FarLeft);
        assert_eq!(d.direction(25.0, 100), Direction::Left);
        assert_eq!(d.direction(50.0, 100), Direction::Center);
        assert_eq!(d.direction(70.0, 100), Direction::Right);
        assert_eq!(d.direction(80.0, 100), Direction::FarRight);
    }

    #[test]
    fn three_way_buckets() {
        let d = SpatialDescriber::new(DirectionScheme::ThreeWay, DistanceThresholds::default());
        assert_eq!(d.direction(29.0, 100), Direction::Left);
        assert_eq!(d.direction(30.0, 100), Direction::Center);
        assert_eq!(d.direction(70.0, 100), Direction::Center);
        assert_eq!(d.direction(71.0, 100), Direction::Right);
    }

    #[test]
    fn distance_buckets_are_strict() {
        let t = DistanceThresholds::default();
        assert_eq!(t.classify(0.6), Distance::VeryClose);
        assert_eq!(t.classify(0.5), Distance::Nearby);
        assert_eq!(t.classify(0.25), Distance::InTheDistance);
        assert_eq!(t.classify(0.10), Distance::FarAway);
    }

    #[test]
    fn tier_thresholds_override_defaults() {
        let d = SpatialDescriber::default();
        let small = det(40.0, 60.0, 40.0, 60.0); // 0.04 of the frame
        assert_eq!(d.describe(&small, 100).distance, Distance::FarAway);

        let hazard = DistanceThresholds {
            very_close: 0.35,
            nearby: 0.15,
            in_the_distance: 0.03,
        };
        let placement = d.describe_with(&small, 100, Some(&hazard));
        assert_eq!(placement.distance, Distance::InTheDistance);
        assert_eq!(placement.direction, Direction::Center);
    }

    #[test]
    fn describe_is_deterministic() {
        let d = SpatialDescriber::default();
        let a = det(0.0, 30.0, 0.0, 90.0);
        assert_eq!(d.describe(&a, 100), d.describe(&a, 100));
    }

    #[test]
    fn rejects_unordered_thresholds() {
        let bad = DistanceThresholds {
            very_close: 0.2,
            nearby: 0.3,
            in_the_distance: 0.1,
        };
        assert!(matches!(bad.validate(), Err(PipelineError::Configuration(_))));
    }
}
