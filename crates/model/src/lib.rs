//! Shared stepflow documents.
//!
//! Everything the server and the handler layer exchange lives here:
//! - [`process`]: the editable step definitions
//! - [`runtime`]: execution state, one document per started process
//! - [`validate`]: structural validation for both
//! - [`time`]: the millisecond-epoch time source

pub mod process;
pub mod runtime;
pub mod time;
pub mod validate;

pub use process::{ActionSpec, ConditionSpec, Note, Opts, Process, ResponseSpec, Step};
pub use runtime::{LogEntry, Runtime, StepResult, Task};
pub use time::{now_ms, plausible_ms, MIN_EPOCH_MS};
pub use validate::{validate_process, validate_runtime, ValidationError};
