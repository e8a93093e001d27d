//! Build metadata and the module API version.
//!
//! The generated `version.rs` from the build script is included here so the
//! host and the binary share a single source of truth.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Fallback used when the build script could not read the manifest metadata.
const DEFAULT_API_VERSION: u32 = 20250727;

/// Module API version the host was built against.
pub fn get_api_version() -> u32 {
    MODULE_API_VERSION.parse().unwrap_or(DEFAULT_API_VERSION)
}

/// Major component of an API version (the year).
///
/// Modules built against the same major version are considered compatible.
pub fn major_version(api_version: u32) -> u32 {
    api_version / 10000
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}
