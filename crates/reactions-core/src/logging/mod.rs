//! Structured logging with `tracing`.
//!
//! [`init_subscriber`] installs the global subscriber once at startup. The
//! level comes from [`LogConfig::level`] unless `RUST_LOG` is set, in which
//! case the environment wins. Records emitted inside [`service_span`] carry
//! `service="reactions"`.

pub mod types;

pub use types::{DEFAULT_OUTPUT, LogConfig, LogFormat};

use std::backtrace::Backtrace;
use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing::Span;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Value of the `service` field on every record.
pub const SERVICE_NAME: &str = "reactions";

/// Root span for the process. Work spawned inside it inherits the
/// `service` field.
pub fn service_span() -> Span {
    tracing::info_span!("reactions", service = SERVICE_NAME)
}

/// Writer that copies each record to every destination in `outputs`.
///
/// `"stdout"` and `"stderr"` name the standard streams; anything else is a
/// file path opened in append mode. An empty list writes to stderr.
pub fn make_writer(outputs: &[String]) -> io::Result<BoxMakeWriter> {
    let mut writer: Option<BoxMakeWriter> = None;
    for output in outputs {
        let next = open_output(output)?;
        writer = Some(match writer {
            Some(prev) => BoxMakeWriter::new(prev.and(next)),
            None => next,
        });
    }
    Ok(writer.unwrap_or_else(|| BoxMakeWriter::new(io::stderr)))
}

fn open_output(output: &str) -> io::Result<BoxMakeWriter> {
    Ok(match output {
        "stdout" => BoxMakeWriter::new(io::stdout),
        "stderr" => BoxMakeWriter::new(io::stderr),
        path => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
    })
}

fn is_std_stream(output: &str) -> bool {
    matches!(output, "stdout" | "stderr")
}

/// Build the formatting layer without installing it.
pub fn build_layer(config: &LogConfig) -> io::Result<Box<dyn Layer<Registry> + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let writer = make_writer(&config.output)?;
    let ansi = config.output.iter().all(|o| is_std_stream(o));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(ansi)
        .with_file(config.log_caller)
        .with_line_number(config.log_caller)
        .with_writer(writer);

    Ok(match config.format {
        LogFormat::Json => fmt_layer.json().with_span_list(true).with_filter(filter).boxed(),
        LogFormat::Compact => fmt_layer.compact().with_filter(filter).boxed(),
    })
}

/// Initialize the global tracing subscriber.
///
/// Subsequent calls are no-ops. Fails only if a log file cannot be opened.
pub fn init_subscriber(config: &LogConfig) -> io::Result<()> {
    let layer = build_layer(config)?;
    // try_init fails if a global subscriber is already set
    let _ = tracing_subscriber::registry().with(layer).try_init();
    Ok(())
}

/// Log panics at error level with a captured backtrace, then hand off to
/// the previously installed hook.
pub fn log_panics_with_backtrace() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::force_capture();
        tracing::error!(panic = %info, %backtrace, "panicked");
        previous(info);
    }));
}
