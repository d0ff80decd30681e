//! # Tool Path Resolver
//!
//! This module handles finding the optional external compression tools:
//! - Bundled with a packaged build
//! - Shipped in a `vendor/<platform>/<arch>` tree
//! - Next to the running executable
//! - System-installed tools on the search path
//!
//! A missing tool is not an error: `None` tells the engine to fall back.

use crate::engine::strategy::{CJPEG, CWEBP, GIFSICLE, JPEGTRAN, PNGQUANT, PNG_OPTIMIZERS};
use crate::platform::{arch_key, executable_suffix, platform_key, SystemInfo};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{debug, warn};

/// Packaged runtime directory override.
pub const BUNDLE_DIR_ENV: &str = "IMGCOMPRESS_BUNDLE_DIR";
/// Vendor root override.
pub const VENDOR_DIR_ENV: &str = "IMGCOMPRESS_VENDOR_DIR";

/// Every tool the engines may ask for, grouped by what it serves.
pub const KNOWN_TOOLS: &[(&str, &[&str])] = &[
    ("JPEG", &["jpegtran", "cjpeg", "mozjpeg"]),
    ("PNG", &["pngquant", "oxipng", "optipng"]),
    ("GIF", &["gifsicle"]),
    ("WebP", &["cwebp"]),
];

/// Lookup seam between the engines and the filesystem.
pub trait ToolLookup: Send + Sync {
    /// Resolves the first candidate name found, in search order.
    fn resolve(&self, candidate_names: &[&str]) -> Option<PathBuf>;
}

/// Ordered directories searched before the system path.
#[derive(Debug, Clone, Default)]
pub struct ToolSearchPaths {
    pub dirs: Vec<PathBuf>,
    pub use_system_path: bool,
}

impl ToolSearchPaths {
    /// Only the given directories, no system path. Mostly for tests.
    pub fn only(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            use_system_path: false,
        }
    }

    /// Build the search list for the current process.
    pub fn detect() -> Self {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        debug!("Executable directory: {:?}", exe_dir);

        let bundle_dir = Self::detect_bundle_dir(exe_dir.as_deref());
        let vendor_root = env::var_os(VENDOR_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| exe_dir.as_ref().map(|dir| dir.join("vendor")));

        Self::from_roots(bundle_dir.as_deref(), vendor_root.as_deref(), exe_dir.as_deref())
    }

    /// Lay out the search order from the three roots.
    pub fn from_roots(bundle_dir: Option<&Path>, vendor_root: Option<&Path>, exe_dir: Option<&Path>) -> Self {
        let mut dirs = Vec::new();

        if let Some(bundle) = bundle_dir {
            dirs.push(bundle.to_path_buf());
            dirs.extend(Self::vendor_layout(&bundle.join("vendor")));
        }
        if let Some(vendor) = vendor_root {
            dirs.extend(Self::vendor_layout(vendor));
        }
        if let Some(exe) = exe_dir {
            dirs.push(exe.to_path_buf());
        }

        let mut seen = std::collections::HashSet::new();
        dirs.retain(|dir| seen.insert(dir.clone()));

        Self {
            dirs,
            use_system_path: true,
        }
    }

    /// `vendor/<platform>/<arch>`, `vendor/<platform>`, `vendor`.
    fn vendor_layout(vendor_root: &Path) -> [PathBuf; 3] {
        let platform_dir = vendor_root.join(platform_key());
        [
            platform_dir.join(arch_key()),
            platform_dir,
            vendor_root.to_path_buf(),
        ]
    }

    fn detect_bundle_dir(exe_dir: Option<&Path>) -> Option<PathBuf> {
        // Strategy 1: explicit override set by the packaging launcher
        if let Some(bundle) = env::var_os(BUNDLE_DIR_ENV) {
            let bundle = PathBuf::from(bundle);
            debug!("Checking {}: {:?}", BUNDLE_DIR_ENV, bundle);
            if bundle.is_dir() {
                return Some(bundle);
            }
            warn!("{} points to a missing directory: {:?}", BUNDLE_DIR_ENV, bundle);
        }

        // Strategy 2: macOS application bundle layout
        if cfg!(target_os = "macos") {
            if let Some(resources) = exe_dir.map(|dir| dir.join("..").join("Resources")) {
                if resources.is_dir() {
                    debug!("Found application bundle resources: {:?}", resources);
                    return Some(resources);
                }
            }
        }

        None
    }
}

type ToolKey = Vec<String>;
type ToolSlot = Arc<OnceLock<Option<PathBuf>>>;

/// Resolved tool paths keyed by the exact candidate-name tuple.
///
/// Each key is filled once and never changes for the lifetime of the cache.
/// The keys the engines and the tool report ask for are laid out when the
/// cache is built: after the first fill they are read through their
/// `OnceLock` alone, with no lock taken. Any other key lives in a map behind
/// an `RwLock`.
#[derive(Debug)]
pub struct ToolCache {
    preset: Vec<(ToolKey, OnceLock<Option<PathBuf>>)>,
    extra: RwLock<HashMap<ToolKey, ToolSlot>>,
}

impl Default for ToolCache {
    fn default() -> Self {
        let engine_keys = [JPEGTRAN, CJPEG, PNG_OPTIMIZERS, PNGQUANT, GIFSICLE, CWEBP];
        let report_keys = KNOWN_TOOLS
            .iter()
            .flat_map(|(_, tools)| tools.iter().map(std::slice::from_ref));

        let mut preset: Vec<(ToolKey, OnceLock<Option<PathBuf>>)> = Vec::new();
        for names in engine_keys.into_iter().chain(report_keys) {
            let key = Self::key(names);
            if !preset.iter().any(|(existing, _)| *existing == key) {
                preset.push((key, OnceLock::new()));
            }
        }

        Self {
            preset,
            extra: RwLock::default(),
        }
    }
}

impl ToolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `names`, running `resolve` on first use.
    pub fn get_or_resolve<F>(&self, names: &[&str], resolve: F) -> Option<PathBuf>
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        if let Some(slot) = self.preset_slot(names) {
            return slot.get_or_init(resolve).clone();
        }
        self.extra_slot(names).get_or_init(resolve).clone()
    }

    /// Already-filled value for `names`, if any.
    pub fn cached(&self, names: &[&str]) -> Option<Option<PathBuf>> {
        if let Some(slot) = self.preset_slot(names) {
            return slot.get().cloned();
        }
        let slots = self.extra.read().unwrap_or_else(|e| e.into_inner());
        slots.get(&Self::key(names)).and_then(|slot| slot.get().cloned())
    }

    fn preset_slot(&self, names: &[&str]) -> Option<&OnceLock<Option<PathBuf>>> {
        self.preset
            .iter()
            .find(|(key, _)| key.iter().map(String::as_str).eq(names.iter().copied()))
            .map(|(_, slot)| slot)
    }

    fn extra_slot(&self, names: &[&str]) -> ToolSlot {
        let key = Self::key(names);
        {
            let slots = self.extra.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = slots.get(&key) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.extra.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(key).or_default())
    }

    fn key(names: &[&str]) -> ToolKey {
        names.iter().map(|name| name.to_string()).collect()
    }
}

/// Tool path resolver for different deployment environments
#[derive(Debug, Clone)]
pub struct ToolResolver {
    search: ToolSearchPaths,
    cache: Arc<ToolCache>,
}

impl ToolResolver {
    pub fn new(search: ToolSearchPaths, cache: Arc<ToolCache>) -> Self {
        Self { search, cache }
    }

    /// Resolver for the running process with a fresh cache.
    pub fn detect() -> Self {
        Self::new(ToolSearchPaths::detect(), Arc::new(ToolCache::new()))
    }

    fn search_uncached(&self, candidate_names: &[&str]) -> Option<PathBuf> {
        for dir in &self.search.dirs {
            for name in candidate_names {
                if let Some(path) = Self::find_in_dir(dir, name) {
                    debug!("Using bundled tool: {} -> {:?}", name, path);
                    return Some(path);
                }
            }
        }

        if self.search.use_system_path {
            for name in candidate_names {
                if let Some(path) = Self::find_in_system_path(name) {
                    debug!("Using system tool: {} -> {:?}", name, path);
                    return Some(path);
                }
            }
        }

        debug!("Tool not found: {:?}", candidate_names);
        None
    }

    fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
        let plain = dir.join(name);
        if plain.is_file() {
            return Some(plain);
        }
        let suffix = executable_suffix();
        if !suffix.is_empty() {
            let with_suffix = dir.join(format!("{}{}", name, suffix));
            if with_suffix.is_file() {
                return Some(with_suffix);
            }
        }
        None
    }

    /// Find tool in system PATH
    fn find_in_system_path(name: &str) -> Option<PathBuf> {
        let path_var = env::var_os("PATH")?;
        env::split_paths(&path_var).find_map(|dir| Self::find_in_dir(&dir, name))
    }

    /// Get a report of tool availability
    pub fn tools_report(&self) -> String {
        let mut report = String::new();
        report.push_str("Tool Path Resolver Report\n");
        report.push_str(&format!("Platform: {}\n", SystemInfo::current()));
        report.push_str("Search directories:\n");
        for dir in &self.search.dirs {
            report.push_str(&format!("  {}\n", dir.display()));
        }
        if self.search.use_system_path {
            report.push_str("  <system PATH>\n");
        }
        report.push_str("\nTool Availability:\n");

        for (category, tools) in KNOWN_TOOLS {
            report.push_str(&format!("\n{}:\n", category));
            for tool in *tools {
                match self.resolve(&[*tool]) {
                    Some(path) => report.push_str(&format!("  [x] {} -> {}\n", tool, path.display())),
                    None => report.push_str(&format!("  [ ] {} (not found)\n", tool)),
                }
            }
        }

        report
    }
}

impl ToolLookup for ToolResolver {
    fn resolve(&self, candidate_names: &[&str]) -> Option<PathBuf> {
        self.cache
            .get_or_resolve(candidate_names, || self.search_uncached(candidate_names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"#!/bin/sh\n").unwrap();
    }

    #[test]
    fn test_vendor_layout_order() {
        let search = ToolSearchPaths::from_roots(
            Some(Path::new("/bundle")),
            Some(Path::new("/vendor")),
            Some(Path::new("/app")),
        );
        let platform = platform_key();
        let arch = arch_key();
        assert_eq!(
            search.dirs,
            vec![
                PathBuf::from("/bundle"),
                PathBuf::from("/bundle/vendor").join(platform).join(arch),
                PathBuf::from("/bundle/vendor").join(platform),
                PathBuf::from("/bundle/vendor"),
                PathBuf::from("/vendor").join(platform).join(arch),
                PathBuf::from("/vendor").join(platform),
                PathBuf::from("/vendor"),
                PathBuf::from("/app"),
            ]
        );
        assert!(search.use_system_path);
    }

    #[test]
    fn test_earlier_directory_wins() {
        let temp = TempDir::new().unwrap();
        let arch_dir = temp.path().join("vendor").join(platform_key()).join(arch_key());
        let root_dir = temp.path().join("vendor");
        touch(&arch_dir.join("gifsicle"));
        touch(&root_dir.join("gifsicle"));

        let resolver = ToolResolver::new(
            ToolSearchPaths::only(ToolSearchPaths::vendor_layout(&root_dir).to_vec()),
            Arc::new(ToolCache::new()),
        );
        assert_eq!(resolver.resolve(&["gifsicle"]), Some(arch_dir.join("gifsicle")));
    }

    #[test]
    fn test_candidate_order_within_directory() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("mozjpeg"));

        let resolver = ToolResolver::new(
            ToolSearchPaths::only(vec![temp.path().to_path_buf()]),
            Arc::new(ToolCache::new()),
        );
        assert_eq!(resolver.resolve(&["cjpeg", "mozjpeg"]), Some(temp.path().join("mozjpeg")));
    }

    #[test]
    fn test_directories_are_not_tools() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("cwebp")).unwrap();

        let resolver = ToolResolver::new(
            ToolSearchPaths::only(vec![temp.path().to_path_buf()]),
            Arc::new(ToolCache::new()),
        );
        assert_eq!(resolver.resolve(&["cwebp"]), None);
    }

    #[test]
    fn test_missing_tool_is_cached_as_none() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(ToolCache::new());
        let resolver = ToolResolver::new(
            ToolSearchPaths::only(vec![temp.path().to_path_buf()]),
            Arc::clone(&cache),
        );

        assert_eq!(resolver.resolve(&["pngquant"]), None);
        assert_eq!(cache.cached(&["pngquant"]), Some(None));

        // Installing the tool later does not change the cached answer
        touch(&temp.path().join("pngquant"));
        assert_eq!(resolver.resolve(&["pngquant"]), None);
    }

    #[test]
    fn test_cache_is_keyed_by_exact_tuple() {
        let cache = ToolCache::new();
        let calls = AtomicUsize::new(0);
        let resolve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(PathBuf::from("/bin/oxipng"))
        };

        cache.get_or_resolve(&["oxipng", "optipng"], resolve);
        cache.get_or_resolve(&["oxipng", "optipng"], resolve);
        cache.get_or_resolve(&["optipng", "oxipng"], resolve);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.cached(&["oxipng"]), None);
    }

    #[test]
    fn test_engine_keys_are_laid_out_up_front() {
        let cache = ToolCache::new();
        for names in [JPEGTRAN, CJPEG, PNG_OPTIMIZERS, PNGQUANT, GIFSICLE, CWEBP] {
            assert!(cache.preset_slot(names).is_some(), "{:?}", names);
        }
        assert!(cache.preset_slot(&["optipng"]).is_some());
        assert!(cache.preset_slot(&["optipng", "oxipng"]).is_none());

        cache.get_or_resolve(CWEBP, || Some(PathBuf::from("/usr/bin/cwebp")));
        assert!(cache.extra.read().unwrap().is_empty());
        assert_eq!(cache.cached(CWEBP), Some(Some(PathBuf::from("/usr/bin/cwebp"))));
    }

    #[test]
    fn test_unlisted_key_is_cached_once() {
        let cache = ToolCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            cache.get_or_resolve(&["zopflipng"], || {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached(&["zopflipng"]), Some(None));
    }

    #[test]
    fn test_concurrent_fill_runs_once() {
        let cache = Arc::new(ToolCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache.get_or_resolve(&["cwebp"], || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Some(PathBuf::from("/usr/bin/cwebp"))
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(PathBuf::from("/usr/bin/cwebp")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tools_report_lists_every_known_tool() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("gifsicle"));
        let resolver = ToolResolver::new(
            ToolSearchPaths::only(vec![temp.path().to_path_buf()]),
            Arc::new(ToolCache::new()),
        );

        let report = resolver.tools_report();
        assert!(report.contains("[x] gifsicle"));
        assert!(report.contains("[ ] cwebp (not found)"));
    }
}
