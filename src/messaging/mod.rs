/// Messaging module for the component bus
///
/// This module defines what travels between components:
/// - **Messages**: immutable events and commands, broadcast to every hub and
///   filtered by each component
/// - **Calls**: invocations of exported methods, answered either to a
///   blocked caller or as a `CallReply` message
/// - **Taps**: external observers of the broadcast stream
///
/// ## Architecture
///
/// ```text
/// ┌───────────┐  broadcast   ┌───────┐  FIFO   ┌────────────┐
/// │ Component │ ───────────> │  App  │ ──────> │ Hub thread │ ──> receive()
/// └───────────┘              └───────┘         └────────────┘
///                                │
///                                │ publish
///                                ▼
///                           ┌──────────┐
///                           │ EventBus │ ──> external taps (CLI, tests)
///                           └──────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let app = App::new();
/// let (rx, _id) = app.subscribe();
///
/// app.broadcast(Message::new(MessageKind::SetActive { active: true }).to("headband"));
///
/// while let Ok(msg) = rx.recv() {
///     match msg.kind() {
///         MessageKind::HeadShaken { axis, .. } => { /* react */ }
///         _ => {}
///     }
/// }
/// ```

pub mod bus;
pub mod call;
pub mod message;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use call::{CallRequest, CallResult, PendingCall, ReplyTo};
pub use message::{Message, MessageKind};
