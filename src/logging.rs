use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "gitea_migrator=info";

/// Logs to stderr, filtered through `RUST_LOG` on top of
/// `gitea_migrator=info`. `LOG_FORMAT=json` switches to one JSON object per
/// event.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::from_default_env().add_directive(DEFAULT_DIRECTIVE.parse()?);
    let registry = tracing_subscriber::registry().with(filter);

    if use_json(std::env::var("LOG_FORMAT").ok().as_deref()) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

fn use_json(log_format: Option<&str>) -> bool {
    log_format.is_some_and(|format| format.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_json() {
        assert!(use_json(Some("json")));
        assert!(use_json(Some("JSON")));
        assert!(!use_json(Some("text")));
        assert!(!use_json(None));
    }
}
