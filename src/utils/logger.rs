use std::path::Path;
use std::sync::OnceLock;
use tracing::Subscriber;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

use crate::config::LoggingConfig;

static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn console_layer<S>(json: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stdout)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_ansi(true)
            .with_writer(std::io::stdout)
            .boxed()
    }
}

fn file_layer<S>(file_path: &str, json: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let dir = Path::new(file_path)
        .parent()
        .unwrap_or_else(|| Path::new("./logs"));
    let name = Path::new(file_path)
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("enricher.log"));
    let appender = rolling::daily(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    GUARD.set(guard).ok();

    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(non_blocking)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(non_blocking)
            .boxed()
    }
}

/// Install the global subscriber: console output, plus a daily rolling file
/// when `to_file` is set. `json` switches both to one JSON object per event.
pub fn init_logger(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let file = cfg
        .to_file
        .then(|| file_layer(&cfg.file_path, cfg.json));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer(cfg.json))
        .with(file)
        .init();
}
