//! Cross-platform process spawning helpers.
//!
//! On Windows, spawning console binaries (mplayer) from a GUI application can
//! cause a console window to appear for each invocation. Some terminal-sensing
//! player builds also refuse to start in slave mode without `TERM`. This module
//! centralizes both adjustments.

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Terminal type injected when the parent environment has none.
pub const FALLBACK_TERM: &str = "xterm";

/// Apply platform-specific flags to a tokio process command.
pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Set `TERM` on the child if the current environment does not define it.
///
/// Returns whether the variable was injected.
pub fn ensure_term_env(cmd: &mut tokio::process::Command) -> bool {
    if std::env::var_os("TERM").is_some() {
        return false;
    }
    cmd.env("TERM", FALLBACK_TERM);
    true
}
