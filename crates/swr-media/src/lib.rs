//! External tool execution for the streetwarp job runner.

pub mod command;
pub mod concat;
pub mod error;

pub use command::{run_lines, CommandSpec, MAX_LINE_BYTES};
pub use concat::{check_muxer, concat_pair};
pub use error::{ExecError, ExecResult};
