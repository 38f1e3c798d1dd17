// Terminal Output
// Colored progress and diagnostics on stderr; rendered markup and values go to stdout

use std::fmt::Display;
use std::path::Path;

const LABEL_WIDTH: usize = 10;

/// Progress line naming the file being worked on, e.g. `   Loaded lib.xml`
pub fn step(label: &str, path: &Path) {
    eprintln!(
        "\x1b[1;32m{:>width$}\x1b[0m {}",
        label,
        path.display(),
        width = LABEL_WIDTH
    );
}

/// Report a failed command and the source fragment it points at
pub fn failure(error: &dyn Display, fragment: Option<&str>) {
    eprintln!("{}", format_failure(error, fragment));
}

pub fn note(message: impl Display) {
    eprintln!("\x1b[33mnote:\x1b[0m {}", message);
}

/// Trailing summary under a listing
pub fn summary(message: impl Display) {
    eprintln!("\x1b[2m{}\x1b[0m", message);
}

fn format_failure(error: &dyn Display, fragment: Option<&str>) -> String {
    let mut out = format!("\x1b[1;31mosml:\x1b[0m {}", error);
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        out.push_str(&format!(
            "\n\x1b[2m{:>width$} {}\x1b[0m",
            "at:",
            fragment,
            width = LABEL_WIDTH
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_shows_fragment() {
        let out = format_failure(&"unexpected ')'", Some("(1+2))"));
        assert!(out.starts_with("\x1b[1;31mosml:\x1b[0m unexpected ')'"));
        assert!(out.ends_with("       at: (1+2))\x1b[0m"));
    }

    #[test]
    fn test_failure_without_fragment_is_one_line() {
        assert!(!format_failure(&"bad template", Some("")).contains('\n'));
        assert!(!format_failure(&"bad template", None).contains('\n'));
    }
}
