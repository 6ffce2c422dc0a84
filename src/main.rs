//! Command-line driver.

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use otel_weave::{
    config::WeaveContext,
    interceptor,
    setup::{self, SetupOptions},
};
use std::{fs::OpenOptions, path::PathBuf, process::exit, sync::Arc};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

#[derive(Parser)]
#[command(
    name = "otel-weave",
    version,
    about = "Compile-time auto-instrumentation for Go builds"
)]
struct Opts {
    #[command(subcommand)]
    cmd: Subcommands,
}

#[derive(Subcommand)]
enum Subcommands {
    /// Discover dependencies, match rules and write the matched manifest.
    Setup {
        /// Additional rule file merged with the bundled rules.
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Arguments forwarded to the dry build.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        build_args: Vec<String>,
    },
    /// Back up module files, run setup, then run an instrumented build.
    Go {
        #[arg(long)]
        rules: Option<PathBuf>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        build_args: Vec<String>,
    },
    /// Invoked by the build driver in place of each subprocess.
    #[command(hide = true)]
    Toolexec {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print version, commit and build time.
    Version {
        /// Also print the host Go toolchain version.
        #[arg(long)]
        verbose: bool,
    },
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opts = Opts::parse();

    match opts.cmd {
        Subcommands::Setup { rules, build_args } => {
            let ctx = current_context()?;
            ctx.paths.create_all().wrap_err("creating build-temp directory")?;
            init_logging(Some(&ctx));
            let opts = SetupOptions { rules_file: rules, build_args };
            let manifest = setup::run_setup(&ctx, &opts).wrap_err("setup failed")?;
            println!("matched {} compile units", manifest.rule_sets.len());
            Ok(())
        }
        Subcommands::Go { rules, build_args } => {
            let ctx = current_context()?;
            ctx.paths.create_all().wrap_err("creating build-temp directory")?;
            init_logging(Some(&ctx));
            let opts = SetupOptions { rules_file: rules, build_args };
            let code = setup::run_go(&ctx, &opts).wrap_err("instrumented build failed")?;
            exit(code);
        }
        Subcommands::Toolexec { args } => {
            let ctx = WeaveContext::from_env()
                .wrap_err("toolexec requires OTEL_WORK_DIR to locate the build-temp area")?;
            init_logging(Some(&ctx));
            let code = interceptor::run(&ctx, &args).wrap_err("interception failed")?;
            exit(code);
        }
        Subcommands::Version { verbose } => {
            let ctx = current_context()?;
            println!("{}", setup::version_line(verbose, &ctx));
            Ok(())
        }
    }
}

fn current_context() -> eyre::Result<WeaveContext> {
    let cwd = std::env::current_dir().wrap_err("cannot determine working directory")?;
    Ok(WeaveContext::new(cwd)?)
}

/// Stderr logging filtered by `OTEL_WEAVE_LOG` (or `RUST_LOG`), plus a
/// debug log under the build-temp directory when available.
fn init_logging(ctx: Option<&WeaveContext>) {
    let filter = EnvFilter::try_from_env("OTEL_WEAVE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer =
        fmt::layer().with_writer(std::io::stderr).with_target(false).with_filter(filter);

    let file_layer = ctx.and_then(|ctx| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(ctx.paths.debug_log())
            .ok()
            .map(|file| {
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::DEBUG)
            })
    });

    // the subscriber may already be set when tests drive the entry points
    let _ = tracing_subscriber::registry().with(stderr_layer).with(file_layer).try_init();
}
