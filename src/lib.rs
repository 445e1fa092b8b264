pub mod catalog;
pub mod expansion;
pub mod filter;
pub mod hierarchy;
pub mod query;
pub mod settings;
pub mod snapshot;
pub mod utils;

pub use catalog::{Category, CategoryId, RawCategory};
pub use expansion::ExpansionState;
pub use query::{CategoryQuery, Page, SortDirective, StatusFilter};
pub use snapshot::CategorySnapshot;

/// Install the stderr log subscriber used by the binaries.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` applies
/// (e.g. `"warn"`, or `"categoria_lib=debug,info"` for verbose runs).
pub fn init_logging(default_directive: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run `f` with a debug-level subscriber on this thread and return what it logged
#[cfg(test)]
pub(crate) fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}
