//! Built-in condition handlers.

mod manual_advance;
mod object_value;
mod task_done;
mod time;

pub use manual_advance::ManualAdvance;
pub use object_value::{Compare, ObjectValue};
pub use task_done::TaskDone;
pub use time::{TimeAbsolute, TimeElapsed};
