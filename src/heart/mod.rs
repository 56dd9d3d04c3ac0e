/// Heart-rate input
///
/// Samples come from a live socket or a replay file, are posted as
/// `HeartBeat` messages, and feed the excitement detector.

pub mod component;
pub mod receiver;
pub mod sample;

pub use component::{ExcitementMonitor, HeartMonitor};
pub use receiver::HeartSource;
pub use sample::HeartSample;
