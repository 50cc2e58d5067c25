//! Built-in action handlers.

mod object_patch;
mod task_create;
mod webhook;

pub use object_patch::ObjectPatch;
pub use task_create::TaskCreate;
pub use webhook::Webhook;
