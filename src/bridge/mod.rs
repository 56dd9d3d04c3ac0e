/// Controller bridge
///
/// Lets a parent process call exported methods of the components running in
/// this one:
///
/// ```text
/// ┌────────────────────┐  JSON lines   ┌──────────────────┐  App::call  ┌───────────┐
/// │ RemoteController   │ ────────────> │ ControllerBridge │ ──────────> │ Component │
/// │ (parent process)   │ <──────────── │ (background task)│ <────────── │ (any hub) │
/// └────────────────────┘               └──────────────────┘             └───────────┘
/// ```
pub mod controller;
pub mod protocol;

pub use controller::{serve, ControllerBridge, RemoteController};
pub use protocol::{Request, Response};
