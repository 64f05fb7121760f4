// Initializes the tracing subscriber for the CLI binary.

use std::env;
use std::io::IsTerminal;

use tracing_subscriber::fmt::format::FmtSpan;

use s3clean_rs::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";

fn event_filter(config: &TracingConfig) -> (String, bool) {
    let tracing_level = config.tracing_level;
    if config.aws_sdk_tracing {
        return (
            format!(
                "s3clean_rs={tracing_level},s3clean={tracing_level},aws_smithy_runtime={tracing_level},aws_config={tracing_level},aws_sigv4={tracing_level}"
            ),
            true,
        );
    }
    match env::var(EVENT_FILTER_ENV_VAR) {
        Ok(filter) => (filter, true),
        Err(_) => (
            format!("s3clean_rs={tracing_level},s3clean={tracing_level}"),
            false,
        ),
    }
}

pub fn init_tracing(config: &TracingConfig) {
    let fmt_span = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let (event_filter, show_target) = event_filter(config);

    let subscriber_builder = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .compact()
        .with_ansi(!config.disable_color_tracing && std::io::stdout().is_terminal())
        .with_span_events(fmt_span)
        .with_env_filter(event_filter)
        .with_target(show_target);

    if config.json_tracing {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusty_fork::rusty_fork_test;

    fn tracing_config(json_tracing: bool, aws_sdk_tracing: bool) -> TracingConfig {
        TracingConfig {
            tracing_level: log::Level::Info,
            json_tracing,
            aws_sdk_tracing,
            span_events_tracing: false,
            disable_color_tracing: false,
        }
    }

    rusty_fork_test! {
        #[test]
        fn init_json_tracing() {
            init_tracing(&tracing_config(true, false));
        }

        #[test]
        fn init_span_events_tracing() {
            init_tracing(&TracingConfig {
                span_events_tracing: true,
                ..tracing_config(false, true)
            });
        }

        #[test]
        fn init_disable_color_tracing() {
            init_tracing(&TracingConfig {
                disable_color_tracing: true,
                ..tracing_config(false, false)
            });
        }

        #[test]
        fn sdk_tracing_filter_includes_sdk_crates() {
            let (filter, show_target) = event_filter(&tracing_config(false, true));
            assert!(filter.contains("aws_smithy_runtime=INFO"), "{filter}");
            assert!(show_target);
        }

        #[test]
        fn default_filter_covers_only_this_crate() {
            // runs in a separate process
            unsafe { env::remove_var(EVENT_FILTER_ENV_VAR) };

            let (filter, show_target) = event_filter(&tracing_config(false, false));
            assert_eq!(filter, "s3clean_rs=INFO,s3clean=INFO");
            assert!(!show_target);
            init_tracing(&tracing_config(false, false));
        }

        #[test]
        fn rust_log_overrides_filter() {
            // runs in a separate process
            unsafe { env::set_var(EVENT_FILTER_ENV_VAR, "trace") };

            let (filter, _) = event_filter(&tracing_config(false, false));
            assert_eq!(filter, "trace");
            init_tracing(&tracing_config(false, false));
        }
    }
}
