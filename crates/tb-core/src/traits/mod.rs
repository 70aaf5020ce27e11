//! Core trait definitions

mod capability;
mod registry;

pub use capability::{CallArgs, Capability};
pub use registry::{AsyncHandler, Member, MemberRegistry, MethodResult, PropertyGetter, SyncHandler};
