//! Developer CLI for exercising the header/URL rewrite engine without a
//! real proxy host.
//!
//! Grounded in `router-cli`'s `clap::Parser`/`Subcommand` shape: a single
//! binary, global flags, one subcommand per operation, `anyhow` for the
//! leaf-binary error path (the library itself never reaches for `anyhow`;
//! see `rewrite-core::error`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use rewrite_core::heap::HeaderHeap;
use rewrite_core::model::Hook;
use rewrite_core::{mime, url};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rewrite-cli")]
#[command(about = "Compile and exercise header-rewrite rule files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a rule file and report success or a structured error.
    Check {
        /// Path to the rule file.
        file: PathBuf,
    },
    /// Compile a rule file and print the per-hook rule counts and the
    /// aggregated resource bitmask each hook's chain requires.
    Dump {
        /// Path to the rule file.
        file: PathBuf,
    },
    /// Compile a rule file, synthesize a `Resources` from CLI flags, run
    /// one hook's chain against it, and print the disposition and the
    /// resulting request headers.
    Eval {
        /// Path to the rule file.
        file: PathBuf,
        /// Hook to run: read-request, pre-remap, remap, send-request,
        /// read-response, send-response.
        #[arg(long)]
        hook: String,
        /// Request method (default GET).
        #[arg(long, default_value = "GET")]
        method: String,
        /// Request URL.
        #[arg(long)]
        url: Option<String>,
        /// Repeatable `Name: value` request header. May be given multiple
        /// times.
        #[arg(long = "header", value_name = "NAME: VALUE")]
        headers: Vec<String>,
    },
}

fn parse_hook(name: &str) -> Result<Hook> {
    match name.to_ascii_lowercase().replace('_', "-").as_str() {
        "read-request" => Ok(Hook::ReadRequest),
        "pre-remap" => Ok(Hook::PreRemap),
        "remap" => Ok(Hook::Remap),
        "send-request" => Ok(Hook::SendRequest),
        "read-response" => Ok(Hook::ReadResponse),
        "send-response" => Ok(Hook::SendResponse),
        other => anyhow::bail!("unknown hook `{other}` (expected one of read-request, pre-remap, remap, send-request, read-response, send-response)"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Check { file } => run_check(file),
        Commands::Dump { file } => run_dump(file),
        Commands::Eval { file, hook, method, url, headers } => {
            run_eval(file, hook, method, url.as_deref(), headers)
        }
    }
}

fn run_check(file: &PathBuf) -> Result<()> {
    match rewrite_core::load_config(file) {
        Ok(config) => {
            println!("OK: {} rule(s) compiled from {}", config.rule_count(), file.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("FAILED: {e}");
            std::process::exit(1);
        }
    }
}

fn run_dump(file: &PathBuf) -> Result<()> {
    let config = rewrite_core::load_config(file).context("compiling rule file")?;
    for hook in Hook::ALL {
        let chain = config.chain(hook);
        println!("{hook:?}: {} rule(s)", chain.rules.len());
    }
    Ok(())
}

fn run_eval(file: &PathBuf, hook_name: &str, method: &str, url_str: Option<&str>, raw_headers: &[String]) -> Result<()> {
    let config = rewrite_core::load_config(file).context("compiling rule file")?;
    let hook = parse_hook(hook_name)?;

    let mut heap = HeaderHeap::new();
    let mime_handle = mime::create(&mut heap);
    for raw in raw_headers {
        let (name, value) = raw
            .split_once(':')
            .with_context(|| format!("`--header` value `{raw}` is not `Name: value`"))?;
        mime::add_header(&mut heap, mime_handle, name.trim(), value.trim());
    }

    let mut remap_handle = None;
    if let Some(u) = url_str {
        let mut parsed = url::Url::new();
        parsed
            .parse(&mut heap, u, url::ParseMode::Strict)
            .with_context(|| format!("`--url` value `{u}` did not parse"))?;
        let h = heap.allocate_url().context("allocating URL object")?;
        *heap.url_mut(h) = parsed;
        remap_handle = Some(h);
    }

    let mut res = rewrite_core::resources_for(hook, &mut heap);
    res.client_request = Some(mime_handle);
    res.method = method.to_string();
    res.remap_url = remap_handle;

    debug!("running hook {hook:?} with method={method}");
    let disposition = rewrite_core::run(&config, hook, &mut res);

    println!("disposition: {disposition:?}");
    println!("status: {}", res.status);
    println!("changed_url: {}", res.changed_url);
    println!("request headers:");
    for addr in mime::iter_all_fields(res.heap, mime_handle) {
        let block = res.heap.field_block(addr.0);
        let slot = block.slot(addr.1);
        println!("  {}: {}", res.heap.str_str(slot.name), res.heap.str_str(slot.value));
    }
    Ok(())
}
