//! Filepath: src/infra/logging.rs
//! Subscriber setup for the binary. The library only emits events.

use tracing_subscriber::EnvFilter;

/// Level used when neither RUST_LOG nor -v is given
fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install a stderr fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` raises the level. Safe to
/// call more than once, later calls are ignored.
pub fn init_tracing(verbosity: u8, no_color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(9), "debug");
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing(0, true);
        init_tracing(2, true);
    }
}
