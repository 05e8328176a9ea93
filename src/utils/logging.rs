use std::io::Write;

use env_logger::Env;

/// Format a console line the way every module tags it: `[context] message`
pub fn tagged(context: &str, message: impl std::fmt::Display) -> String {
    format!("[{}] {}", context, message)
}

/// Initialise `env_logger`; `RUST_LOG` overrides the default `info` level.
///
/// Safe to call more than once (later calls are ignored), which keeps tests
/// that exercise the binary paths simple.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(buf, "[{}] {}", record.level().as_str().to_ascii_lowercase(), record.args())
        })
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_format() {
        assert_eq!(tagged("batch", "3 jobs planned"), "[batch] 3 jobs planned");
    }

    #[test]
    fn test_init_twice() {
        init_logging();
        init_logging();
        log::debug!("logger initialised");
    }
}
