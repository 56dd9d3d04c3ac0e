/// Lifecycle state of components running inside a hub
pub mod lifecycle;

pub use lifecycle::{ComponentState, LifecycleMachine, TransitionError};
