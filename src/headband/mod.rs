/// Headband input processing
///
/// Turns raw headband readings into head events:
///
/// ```text
/// GyroSamples ──> HeadMovement ──> Detector (shake | yesno | raw)
///                                     ├── HeadShaken
///                                     ├── HeadYesNo
///                                     └── HeadGyro
///
/// AccelSamples ─> HeadPosition ──> HeadMoved
/// ```
///
/// Both components stay silent until they receive `SetActive { active: true }`.
pub mod detector;
pub mod movement;
pub mod position;
pub mod recording;

pub use detector::{detector_for, DetectionContext, Detector, MODES};
pub use movement::HeadMovement;
pub use position::HeadPosition;
pub use recording::GyroRecording;
