use cfg_if::cfg_if;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};
use tracing_subscriber::util::SubscriberInitExt;

/// `RUST_LOG` when set and valid, `info` otherwise.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        /// Route spans and events to the devtools console.
        pub fn init() {
            let console = tracing_wasm::WASMLayer::new(tracing_wasm::WASMLayerConfig::default());

            // hot reload re-runs start(); the first subscriber stays
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(console)
                .try_init();

            #[cfg(feature = "console_error_panic_hook")]
            console_error_panic_hook::set_once();
        }
    } else {
        use std::ffi::OsStr;
        use std::path::Path;

        use once_cell::sync::OnceCell;
        use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
        use tracing_subscriber::fmt;

        const DEFAULT_LOG_FILE: &str = "logs/avatar-rig.log";

        // flushes the file writer on drop, so it lives for the whole process
        static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

        /// stderr for the developer, a daily file for bug reports.
        pub fn init() {
            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .compact();

            let file_layer = fmt::layer()
                .with_writer(rolling_file())
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .compact();

            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(stderr_layer)
                .with(file_layer)
                .try_init();

            std::panic::set_hook(Box::new(|info| {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                    .unwrap_or_default();
                let backtrace = std::backtrace::Backtrace::force_capture();
                tracing::error!(%location, "panic: {}\n{backtrace}", panic_message(info.payload()));
            }));
        }

        /// `RUST_LOG_FILE` names the file; rotation appends the date.
        fn rolling_file() -> NonBlocking {
            let configured = std::env::var("RUST_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
            let path = Path::new(&configured);
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().unwrap_or(OsStr::new("avatar-rig.log"));

            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            let _ = FILE_GUARD.set(guard);
            writer
        }

        fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
            payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic>".to_string())
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::panic_message;

    #[test]
    fn panic_payloads_become_text() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "<non-string panic>");
    }
}
