use std::{
    io::Write as _,
    sync::Once,
    time::{SystemTime, UNIX_EPOCH},
};

static INIT_LOGGING: Once = Once::new();

/// Installs the process logger. `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        let result = env_logger::Builder::from_env(env)
            .format(|buf, record| {
                let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                writeln!(
                    buf,
                    "[fittner-shell][{ts}] {:<5} {}",
                    record.level(),
                    record.args()
                )
            })
            .try_init();
        if let Err(error) = result {
            eprintln!("[fittner-shell] logger already installed: {error}");
        }
    });
}

/// Short, log-safe form of a registration token.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}***(len={})", token.chars().count())
}

pub fn truncate_message(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}

pub fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_token_keeps_prefix_and_length_only() {
        let redacted = redact_token("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(redacted, "abcdefgh***(len=26)");
        assert!(!redacted.contains("xyz"));
    }

    #[test]
    fn redact_token_handles_short_tokens() {
        assert_eq!(redact_token("T1"), "T1***(len=2)");
    }

    #[test]
    fn truncate_message_counts_chars_not_bytes() {
        assert_eq!(truncate_message("인터넷 연결", 3), "인터넷...");
        assert_eq!(truncate_message("short", 10), "short");
    }
}
