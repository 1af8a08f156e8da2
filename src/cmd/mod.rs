//! CLI command implementations.
//!
//! | Module     | Commands handled                    |
//! |------------|-------------------------------------|
//! | `discover` | `Next`                              |
//! | `run`      | `Start`, `Resume`, `Abort`          |
//! | `status`   | `Status`, `Claims`, `Config`        |

pub mod discover;
pub mod run;
pub mod status;

pub use discover::cmd_next;
pub use run::{cmd_abort, cmd_resume, cmd_start};
pub use status::{cmd_claims, cmd_config, cmd_status};
