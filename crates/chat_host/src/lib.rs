//! Chat session engine: conversation state, request dispatch, streaming
//! accumulation and cancellation, independent of any front-end.

pub mod accumulator;
pub mod bus;
pub mod cancel;
pub mod content_filter;
pub mod conversation;
pub mod dispatcher;
pub mod markdown;
pub mod session;

#[cfg(test)]
mod testing;

pub use cancel::CancellationController;
pub use conversation::Conversation;
pub use dispatcher::Dispatcher;
pub use session::{ChatSession, ErrorSlot, FailedInput, TurnOutcome, UserInput};
