/// Component runtime
///
/// Hosts components on hub threads and routes messages and calls between
/// them.
///
/// ## Architecture
///
/// ```text
/// App
///   ├── directory (component name -> hub)
///   ├── taps (EventBus for external observers)
///   └── hubs
///       ├── hub-main    [thread] ── components, timers
///       └── hub-devices [thread] ── components, timers
///                                      └── BackgroundTask [thread]
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let app = App::new();
/// let hub = app.add_hub("main")?;
/// app.add_component(hub, Box::new(ExcitementMonitor::new("excitement", &config.excitement)))?;
///
/// app.broadcast(MessageKind::SetActive { active: true });
/// let state = app.call("excitement", "state", vec![], Duration::from_secs(1))?;
///
/// app.shutdown();
/// ```

pub mod app;
pub mod component;
mod hub;
pub mod registry;
pub mod task;
pub mod timers;

// Re-export commonly used types
pub use app::{App, HubId};
pub use component::{BusSender, Component, Context};
pub use registry::ComponentRegistry;
pub use task::{BackgroundTask, CancelToken, RetryPolicy};
pub use timers::TimerId;
