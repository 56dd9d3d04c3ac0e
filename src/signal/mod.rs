/// Signal analysis
///
/// Pure computations over sensor streams. Nothing here knows about the bus;
/// components in `heart` and `headband` feed these and turn the results into
/// messages.
///
/// ```text
/// HeartSample ─> Excitement
///                  └── Window (OLS slope, variance)
///                        ├── Slopes climbs
///                        ├── Slopes falls
///                        └── Slopes coasts
///
/// gyro [x,y,z] ─> BiasCalibration (CalibrationStore)
///                  ├── FftAxis       (shake)
///                  ├── SwingAxis     (yes / no / meh)
///                  └── LastValueAxis (raw)
/// ```

pub mod accel;
pub mod calibration;
pub mod excitement;
pub mod filter;
pub mod gyro;
pub mod slope;
pub mod window;

pub use calibration::{CalibrationStore, FileStore, MemoryStore};
pub use excitement::{Excitement, ExcitementState, HSpan};
pub use filter::Biquad;
pub use gyro::{Axis, BiasCalibration, FftAxis, Gesture, LastValueAxis, Swing, SwingAxis};
pub use slope::{Slope, SlopeCheck, Slopes};
pub use window::{SlopeKind, Window};
