//! Player Detection Module
//!
//! Locates a system-installed MPlayer binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{PlayerError, PlayerResult};

/// Default executable name, without platform suffix
pub const DEFAULT_PLAYER_NAME: &str = "mplayer";

/// Information about a detected player installation
#[derive(Debug, Clone)]
pub struct PlayerInfo {
    /// Path to the player binary
    pub path: PathBuf,
    /// First banner line, e.g. "MPlayer 1.5 (Debian)"
    pub version: Option<String>,
}

/// Find the player binary.
///
/// A configured path wins if it exists. Otherwise common install locations
/// are searched, then the system PATH.
pub fn detect_player(configured: Option<&Path>, binary_name: &str) -> PlayerResult<PathBuf> {
    let not_found = || PlayerError::ProcessNotFound {
        binary: configured
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| binary_name.to_string()),
    };

    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(not_found());
    }

    let file_name = executable_name(binary_name);
    for dir in get_common_player_paths() {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    which_player(binary_name).ok_or_else(not_found)
}

/// Detect the player and read its version banner.
pub fn detect_player_info(configured: Option<&Path>, binary_name: &str) -> PlayerResult<PlayerInfo> {
    let path = detect_player(configured, binary_name)?;
    let version = get_player_version(&path);
    Ok(PlayerInfo { path, version })
}

fn executable_name(binary_name: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        if !binary_name.to_ascii_lowercase().ends_with(".exe") {
            return format!("{}.exe", binary_name);
        }
    }
    binary_name.to_string()
}

/// Search PATH using `where` (Windows) or `which` (Unix)
fn which_player(binary_name: &str) -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let finder = "where";

    #[cfg(not(target_os = "windows"))]
    let finder = "which";

    let output = Command::new(finder).arg(binary_name).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
}

/// Get common player installation paths for the current platform
fn get_common_player_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\mplayer"));
        paths.push(PathBuf::from(r"C:\Program Files\MPlayer"));
        paths.push(PathBuf::from(r"C:\Program Files (x86)\MPlayer"));

        // Scoop installation
        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Homebrew paths
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Run the player without arguments and keep its banner line.
///
/// MPlayer prints usage and exits non-zero when given no file, so the exit
/// status is ignored.
fn get_player_version(path: &Path) -> Option<String> {
    let output = Command::new(path).output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_version_banner(&stdout)
}

fn parse_version_banner(output: &str) -> Option<String> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("MPlayer"))?;
    // "MPlayer 1.5 (Debian), built with gcc-12 (C) 2000-2022 MPlayer Team"
    let version = line.split(" (C)").next().unwrap_or(line);
    Some(version.trim_end_matches(',').trim().to_string())
}
