//! `AgentStates`: reusable state machines for player cats and enemy rats.
//!
//! Both families are plain data + free functions operating on that data, the same shape
//! as `crate::physics`'s integration pass — no virtual dispatch, no per-agent subclasses.
//! Each is also exposed as a [`crate::scripts::ScriptType`] so `ScriptRuntime` can drive
//! them through the ordinary `Init/Update/Destroy` lifecycle alongside any other
//! attached script.

pub mod cat;
pub mod rat;

pub use cat::{CatAgent, CatPlan, CatScript, CatState};
pub use rat::{RatAgent, RatScript, RatState};
