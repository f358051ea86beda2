//! Rule-driven HTTP header/URL rewriting engine.
//!
//! This crate is the core: the WKS table, the header heap (pointer heap +
//! string heap), the URL and MIME header objects, the condition/operator
//! model, the rule-file compiler, and the engine that walks a compiled
//! chain against a transaction's [`model::Resources`]. It owns no sockets,
//! no TLS, no HTTP wire codec — the host supplies those and hands this
//! crate the headers/URL it already parsed.

pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod heap;
pub mod mime;
pub mod model;
pub mod url;
pub mod wks;

use std::path::Path;
use std::sync::Arc;

pub use config::EngineConfig;
pub use engine::RulesConfig;
pub use error::{CompileError, HeapError, MimeParseError};
pub use model::{Disposition, Hook, Resources};

/// Compiles a rule file into an `Arc`-shared, immutable [`RulesConfig`].
/// Per spec.md §5 there is no in-place mutation of a loaded config: a
/// reload produces a brand new `Arc` the host swaps in, and in-flight
/// transactions keep whatever `Arc` clone they already hold.
pub fn load_config(path: impl AsRef<Path>) -> Result<Arc<RulesConfig>, CompileError> {
    let config = compiler::compile_file(path.as_ref())?;
    Ok(Arc::new(config))
}

/// Compiles rule-file text already in memory (used by tests and by hosts
/// that fetch their rules from somewhere other than the local filesystem).
pub fn load_config_str(text: &str, source_name: &str) -> Result<Arc<RulesConfig>, CompileError> {
    let config = compiler::compile_str(text, Path::new(source_name))?;
    Ok(Arc::new(config))
}

/// Runs `hook`'s compiled chain from `config` against `res`. Thin wrapper
/// kept at the crate root so callers don't need to reach into `engine` for
/// the one entry point spec.md §6 names.
pub fn run(config: &RulesConfig, hook: Hook, res: &mut Resources) -> Disposition {
    config.run(hook, res)
}

/// Builds a fresh [`Resources`] for one transaction at `hook`, backed by
/// `heap`. Callers then populate `client_request`/`client_response`/etc.
/// with the handles they already allocated before calling [`run`].
pub fn resources_for(hook: Hook, heap: &mut heap::HeaderHeap) -> Resources<'_> {
    Resources::new(hook, heap)
}

/// Like [`resources_for`], but threads `config`'s `timezone` tuning knob
/// (spec.md §6) through to `NOW(...)` condition evaluation.
pub fn resources_for_with_config<'a>(
    hook: Hook,
    heap: &'a mut heap::HeaderHeap,
    config: &EngineConfig,
) -> Resources<'a> {
    let mut res = Resources::new(hook, heap);
    res.use_local_time = matches!(config.timezone.as_deref(), Some(tz) if tz.eq_ignore_ascii_case("local"));
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeaderHeap;

    #[test]
    fn load_config_str_then_run_end_to_end() {
        let config = load_config_str(
            "cond %{METHOD} =GET\nset-header X-Seen \"1\"\n",
            "<inline>",
        )
        .unwrap();

        let mut heap = HeaderHeap::new();
        let mime_handle = mime::create(&mut heap);
        let mut res = resources_for(Hook::Remap, &mut heap);
        res.client_request = Some(mime_handle);
        res.method = "GET".to_string();
        run(&config, Hook::Remap, &mut res);

        let head = mime::field_find(res.heap, mime_handle, "X-Seen").unwrap();
        assert_eq!(res.heap.str_str(res.heap.field_block(head.0).slot(head.1).value), "1");
    }

    #[test]
    fn load_config_missing_file_is_a_compile_error() {
        let err = load_config("/nonexistent/does-not-exist.rules").unwrap_err();
        assert!(matches!(err, CompileError::FileNotFound(_)));
    }
}
