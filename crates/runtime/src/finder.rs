//! Chromium executable discovery.

use std::path::{Path, PathBuf};

use crate::error::{Result, RuntimeError};

/// Environment variable that overrides executable discovery.
pub const CHROME_ENV: &str = "COURIER_CHROME";

/// Resolves the browser executable: an explicit path, then [`CHROME_ENV`],
/// then well-known install locations and `PATH` commands.
pub fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
	if let Some(path) = explicit {
		return existing(path).ok_or_else(|| RuntimeError::BrowserNotFound(format!("{} does not exist", path.display())));
	}

	if let Some(value) = std::env::var_os(CHROME_ENV) {
		let path = PathBuf::from(value);
		return existing(&path)
			.ok_or_else(|| RuntimeError::BrowserNotFound(format!("{CHROME_ENV}={} does not exist", path.display())));
	}

	platform_candidates()
		.into_iter()
		.find_map(|candidate| resolve_candidate(&candidate))
		.ok_or_else(|| {
			RuntimeError::BrowserNotFound(format!(
				"no Chrome/Chromium installation found; install one or set {CHROME_ENV}"
			))
		})
}

fn existing(path: &Path) -> Option<PathBuf> {
	path.exists().then(|| path.to_path_buf())
}

/// Absolute candidates must exist; bare names are looked up on `PATH`.
fn resolve_candidate(candidate: &str) -> Option<PathBuf> {
	if candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':') {
		existing(Path::new(candidate))
	} else {
		which::which(candidate).ok()
	}
}

fn platform_candidates() -> Vec<String> {
	if cfg!(target_os = "macos") {
		[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_candidates()
	} else {
		[
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"microsoft-edge",
			"brave-browser",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	}
}

fn windows_candidates() -> Vec<String> {
	let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
		.into_iter()
		.filter_map(|key| std::env::var_os(key).map(PathBuf::from))
		.collect();
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Chromium", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["BraveSoftware", "Brave-Browser", "Application", "brave.exe"],
	];

	let mut candidates: Vec<String> = roots
		.iter()
		.flat_map(|root| {
			suffixes
				.iter()
				.map(move |suffix| suffix.iter().fold(root.clone(), |path, part| path.join(part)))
		})
		.map(|path| path.to_string_lossy().to_string())
		.collect();

	candidates.extend(["chrome.exe", "msedge.exe", "brave.exe", "chromium.exe"].map(str::to_string));
	candidates
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn windows_candidates_include_common_commands() {
		let candidates = windows_candidates();
		assert!(candidates.contains(&"chrome.exe".to_string()));
		assert!(candidates.contains(&"msedge.exe".to_string()));
		assert!(candidates.iter().any(|c| c.ends_with("chrome.exe") && c.contains("Google")));
	}

	#[test]
	fn explicit_path_must_exist() {
		let err = find_chrome(Some(Path::new("/definitely/not/here/chrome"))).unwrap_err();
		assert!(matches!(err, RuntimeError::BrowserNotFound(_)));
		assert!(err.to_string().starts_with("cannot find chrome binary"));
	}

	#[test]
	fn explicit_path_wins_over_discovery() {
		let dir = TempDir::new().unwrap();
		let fake = dir.path().join("chrome");
		std::fs::write(&fake, "").unwrap();

		assert_eq!(find_chrome(Some(&fake)).unwrap(), fake);
	}

	#[test]
	fn missing_absolute_candidate_is_skipped() {
		assert_eq!(resolve_candidate("/definitely/not/here/chromium"), None);
	}
}
