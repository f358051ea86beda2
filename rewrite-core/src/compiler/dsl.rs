//! Optional external DSL compiler pipe.
//!
//! Some deployments author rules in a higher-level DSL (e.g. `.hrw4u`
//! files) that compiles down to the native rule-file syntax this crate
//! parses. Rather than embedding that DSL's grammar, spec.md §4.6 has the
//! core shell out to an external compiler and read its stdout — mirroring
//! how `original_source/plugins/header_rewrite/header_rewrite.cc` treats
//! `.hrw4u` as "run it through `hrw4u` first, then parse the result like any
//! other rule file."

use crate::error::CompileError;
use std::path::Path;
use std::process::Command;

/// The external compiler binary name looked up on `PATH`. Overridable via
/// `HEADER_REWRITE_DSL_COMPILER` for test harnesses that stage a fake one.
const DEFAULT_DSL_COMPILER: &str = "hrw4u";

pub fn is_dsl_source(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("hrw4u")
}

/// Runs the external DSL compiler over `path` and returns its stdout (native
/// rule-file syntax) for [`super::parser::compile_str`] to parse.
pub fn compile_dsl(path: &Path) -> Result<String, CompileError> {
    let compiler = std::env::var("HEADER_REWRITE_DSL_COMPILER").unwrap_or_else(|_| DEFAULT_DSL_COMPILER.to_string());
    let output = Command::new(&compiler)
        .arg(path)
        .output()
        .map_err(|e| CompileError::DslCompilerFailed {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(CompileError::DslCompilerFailed {
            path: path.to_path_buf(),
            msg: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    String::from_utf8(output.stdout).map_err(|e| CompileError::DslCompilerFailed {
        path: path.to_path_buf(),
        msg: e.to_string(),
    })
}
