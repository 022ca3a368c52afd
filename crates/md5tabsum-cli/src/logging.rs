//! Logging setup.
//!
//! Console output goes to stderr through `tracing_subscriber::fmt`. The run log
//! named by `logfile` is appended to by [`FileLogLayer`], one line per event:
//!
//! ```text
//! 2026-10-16 09:14:03.120391 [INFO ] [instance: postgresql.prod] Connected to db1:5432 (postgresql)
//! ```

use std::fmt::Write as FmtWrite;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Only events from this application reach the run log.
const TARGET_PREFIX: &str = "md5tabsum";

/// Install the global subscriber.
pub fn init(verbosity: &str, format: &str, file: Option<FileLogLayer>) {
    let level = parse_level(verbosity);

    let console = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);
    let console = match format {
        "json" => console.json().boxed(),
        _ => console.boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(console.with_filter(LevelFilter::from_level(level)))
        .with(file)
        .try_init();
}

/// Map a `--verbosity` value to a level. Unknown values fall back to WARN.
pub fn parse_level(verbosity: &str) -> Level {
    match verbosity.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

/// A tracing layer that appends formatted events to the run log file.
pub struct FileLogLayer {
    file: Mutex<File>,
    max_level: Level,
}

impl FileLogLayer {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path, max_level: Level) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
            max_level,
        })
    }
}

impl<S> Layer<S> for FileLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level || !metadata.target().starts_with(TARGET_PREFIX) {
            return;
        }

        let mut visitor = MessageVisitor::new();
        event.record(&mut visitor);

        let now = chrono::Local::now();
        let mut line = String::new();
        let _ = write!(line, "{} [{:5}] ", now.format("%Y-%m-%d %H:%M:%S%.6f"), metadata.level());
        if let Some(instance) = &visitor.instance {
            let _ = write!(line, "[instance: {}] ", instance);
        }
        line.push_str(&visitor.message);
        for field in &visitor.fields {
            line.push(' ');
            line.push_str(field);
        }
        line.push('\n');

        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

/// Visitor splitting an event into its message, `instance` field and the rest.
struct MessageVisitor {
    message: String,
    instance: Option<String>,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn new() -> Self {
        Self {
            message: String::new(),
            instance: None,
            fields: Vec::new(),
        }
    }

    fn record_value(&mut self, field: &tracing::field::Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "instance" => self.instance = Some(value),
            name => self.fields.push(format!("{}={}", name, value)),
        }
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.record_value(field, value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, trace};

    fn capture(max_level: Level, emit: impl FnOnce()) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let layer = FileLogLayer::open(&path, max_level).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, emit);
        std::fs::read_to_string(&path).unwrap()
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("loud"), Level::WARN);
    }

    #[test]
    fn test_file_layer_writes_instance_prefix() {
        let log = capture(Level::INFO, || {
            info!(instance = %"mysql.shop", "Connected to {}:{}", "db1", 3306);
        });
        assert!(log.contains("[INFO ] [instance: mysql.shop] Connected to db1:3306"));
        assert!(log.ends_with('\n'));
    }

    #[test]
    fn test_file_layer_timestamp_format() {
        let log = capture(Level::INFO, || info!("md5tabsum version 1"));
        let stamp = log.split(" [").next().unwrap();
        // YYYY-MM-DD HH:MM:SS.ffffff
        assert_eq!(stamp.len(), 26);
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S%.6f").is_ok());
    }

    #[test]
    fn test_file_layer_respects_level() {
        let log = capture(Level::DEBUG, || {
            info!("kept info");
            debug!("kept debug");
            trace!("dropped trace");
        });
        assert!(log.contains("kept info"));
        assert!(log.contains("kept debug"));
        assert!(!log.contains("dropped trace"));
    }

    #[test]
    fn test_file_layer_ignores_foreign_targets() {
        let log = capture(Level::TRACE, || {
            info!(target: "sqlx::query", "select 1");
            info!("own event");
        });
        assert!(!log.contains("select 1"));
        assert!(log.contains("own event"));
    }

    #[test]
    fn test_file_layer_appends_extra_fields() {
        let log = capture(Level::INFO, || info!(rows = 42u64, "Finished"));
        assert!(log.contains("Finished rows=42"));
    }
}
