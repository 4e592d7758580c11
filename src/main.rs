mod candidates;
mod commands;
mod config;
mod file_name;
mod filter;
mod image_url;
mod options;
mod pagination;
mod reddit_api;
mod time_window;

use std::{any::Any, env, panic, process};

use anyhow::Result;
use backtrace::Backtrace;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::commands::Command;
use crate::options::Options;

async fn run(options: Options, cancel: CancellationToken) -> Result<(), anyhow::Error> {
    match options.command {
        Command::Download(sub_options) => {
            commands::download(options.global, sub_options, cancel).await
        }
    }
}

/// Replaces the default panic output with a crash report that points at the
/// issue tracker, then exits with status 1.
fn install_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let repository = env!("CARGO_PKG_REPOSITORY");

        eprintln!("snoo-dl hit an internal error and has to stop.");
        eprintln!("Reports are welcome at {}/issues", repository);
        eprintln!("Rerunning with -v, -vv or -vvv usually shows what led up to it.");
        eprintln!();
        eprint!("Panic: {}", panic_message(panic_info.payload()));
        match panic_info.location() {
            Some(location) => eprintln!(" ({}:{})", location.file(), location.line()),
            None => eprintln!(),
        }

        if backtrace_requested() {
            eprintln!("{:?}", Backtrace::new());
        } else {
            eprintln!("Set RUST_BACKTRACE=1 to include a backtrace.");
        }

        process::exit(1);
    }));
}

/// `panic!` payloads are a `&'static str` for literal messages and a `String`
/// for formatted ones.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<no message>".to_owned()
    }
}

// Backtrace::new always captures, so the environment has to be checked here.
fn backtrace_requested() -> bool {
    matches!(env::var("RUST_BACKTRACE").as_deref(), Ok("1") | Ok("full"))
}

#[tokio::main]
async fn main() {
    install_panic_hook();

    let options = Options::parse();

    let log_filter = match options.global.verbosity {
        0 => "info",
        1 => "info,snoo_dl=debug",
        2 => "info,snoo_dl=trace",
        _ => "trace",
    };

    let log_env = env_logger::Env::default().default_filter_or(log_filter);

    env_logger::Builder::from_env(log_env)
        .format_module_path(false)
        .format_timestamp(None)
        // Indent following lines equal to the log level label, like `[ERROR] `
        .format_indent(Some(8))
        .init();

    // Requests in flight are aborted, and no new page or image is started.
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            log::info!("caught ctrl-c, stopping");
            ctrl_c_cancel.cancel();
        }
    });

    if let Err(err) = run(options, cancel).await {
        log::error!("command exited with error {err:?}");
        process::exit(1);
    }
}
