use chrono::Utc;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const API_VERSION_KEY: &str = "module_api_version";

fn main() {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let manifest = Path::new(&env::var("CARGO_MANIFEST_DIR").expect("manifest dir is set by cargo"))
        .join("Cargo.toml");

    let generated = format!(
        "pub const MODULE_API_VERSION: &str = \"{}\";\n\
         pub const BUILD_TIME: &str = \"{}\";\n\
         pub const GIT_HASH: &str = \"{}\";\n",
        module_api_version(&manifest),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        git_hash(),
    );

    let dest = out_dir.join("version.rs");
    // Leave the file untouched when nothing changed so dependents are not rebuilt
    if fs::read_to_string(&dest).ok().as_deref() != Some(generated.as_str()) {
        fs::write(&dest, generated).expect("write version.rs");
    }

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=.git/HEAD");
}

/// `[package.metadata] module_api_version`, or "unknown"
fn module_api_version(manifest: &Path) -> String {
    fs::read_to_string(manifest)
        .ok()
        .and_then(|text| text.parse::<toml::Table>().ok())
        .and_then(|table| {
            table
                .get("package")?
                .get("metadata")?
                .get(API_VERSION_KEY)?
                .as_integer()
        })
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn git_hash() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
