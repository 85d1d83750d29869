//! Terminal output for command summaries
//!
//! Uses `cliclack` in interactive terminals and falls back to plain,
//! bracket-tagged lines in CI or when output is piped. Diagnostics go
//! through `tracing`; this module only renders results.
//!
//! ```rust,ignore
//! use cachesync::ui::{self, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "cachesync upload");
//! ui::key_value(&ctx, "commit", "deadbeef");
//! ui::outro_success(&ctx, "3 uploaded, 0 skipped");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    human_bytes, intro, key_value, outro_error, outro_success, outro_warn, remark, section,
    step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
