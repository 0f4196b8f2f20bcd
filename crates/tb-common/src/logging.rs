use std::any::Any;
use std::panic;
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with `RUST_LOG` filtering.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init_tracing_subscriber(app_name: &'static str) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("info,{}=debug", app_name.replace('-', "_"))));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    });
}

/// Route panics through tracing so a crashing worker emits one
/// structured line that lands next to its ingest logs before the
/// default hook takes over. Installed at most once per process.
pub fn install_tracing_panic_hook(app_name: &'static str) {
    static HOOK_SET: OnceLock<()> = OnceLock::new();

    HOOK_SET.get_or_init(|| {
        let previous = panic::take_hook();

        panic::set_hook(Box::new(move |info| {
            let at = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()));

            tracing::error!(
                app = app_name,
                thread = std::thread::current().name().unwrap_or("<unnamed>"),
                at = at.as_deref().unwrap_or("<unknown>"),
                payload = %payload_text(info.payload()),
                "worker panicked"
            );

            previous(info);
        }));
    });
}

fn payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_text_handles_the_common_shapes() {
        let static_str: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(payload_text(static_str.as_ref()), "boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("formatted boom"));
        assert_eq!(payload_text(owned.as_ref()), "formatted boom");

        let opaque: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(payload_text(opaque.as_ref()), "<non-string panic payload>");
    }
}
