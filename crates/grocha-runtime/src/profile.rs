use std::collections::BTreeMap;
use std::time::Duration;

/// Accumulated wall time per command keyword.
#[derive(Debug, Default, Clone)]
pub struct Profiler {
    entries: BTreeMap<String, (Duration, u32)>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, keyword: &str, elapsed: Duration) {
        let entry = self.entries.entry(keyword.to_string()).or_default();
        entry.0 += elapsed;
        entry.1 += 1;
    }

    /// Mean duration of `keyword`, if it ran at least once.
    pub fn average(&self, keyword: &str) -> Option<Duration> {
        self.entries
            .get(keyword)
            .filter(|(_, count)| *count > 0)
            .map(|(total, count)| *total / *count)
    }

    /// `Profile:` then one `Keyword : seconds` line per command.
    pub fn report(&self) -> String {
        let mut out = String::from("Profile:\n");
        for (keyword, (total, count)) in &self.entries {
            let avg = total.as_secs_f64() / f64::from(*count);
            out.push_str(&format!("{} : {:.3}\n", capitalize(keyword), avg));
        }
        out
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
