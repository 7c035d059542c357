use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` filter (default `info`); `LOG_FORMAT=json` for JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt().with_env_filter(filter).with_target(false);
    // Already initialized (tests, embedding) is fine.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
