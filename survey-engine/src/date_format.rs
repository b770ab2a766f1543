use chrono::{DateTime, Datelike, Timelike, Utc};

const TOKENS: [&str; 10] = ["yyyy", "yy", "MM", "M", "dd", "d", "HH", "H", "mm", "ss"];

/// Format `date` with a pattern such as `dd/MM/yyyy`.
///
/// Supported tokens are `yyyy`, `yy`, `MM`, `M`, `dd`, `d`, `HH`, `H`, `mm`
/// and `ss`. A run of one pattern letter is matched as a whole, so a run that
/// is not a token (`MMM`, `yyy`) is copied literally. Every other character
/// is copied as is. No locale is involved.
pub fn format_date(date: &DateTime<Utc>, pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut rest = pattern;
    while let Some(c) = rest.chars().next() {
        let run_len = if "yMdHms".contains(c) {
            rest.len() - rest.trim_start_matches(c).len()
        } else {
            c.len_utf8()
        };
        let (run, tail) = rest.split_at(run_len);
        if TOKENS.contains(&run) {
            out.push_str(&render_token(date, run));
        } else {
            out.push_str(run);
        }
        rest = tail;
    }
    out
}

fn render_token(date: &DateTime<Utc>, token: &str) -> String {
    match token {
        "yyyy" => format!("{:04}", date.year()),
        "yy" => format!("{:02}", date.year().rem_euclid(100)),
        "MM" => format!("{:02}", date.month()),
        "M" => date.month().to_string(),
        "dd" => format!("{:02}", date.day()),
        "d" => date.day().to_string(),
        "HH" => format!("{:02}", date.hour()),
        "H" => date.hour().to_string(),
        "mm" => format!("{:02}", date.minute()),
        "ss" => format!("{:02}", date.second()),
        other => other.to_string(),
    }
}
