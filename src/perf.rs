use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

const HOT_LIMIT: usize = 100;

/// JSONL stage-timing log. Each span and count is appended as one line; totals are
/// summarised into a sibling `<stem>_hot.log` when the logger is dropped.
pub(crate) struct PerfLogger {
    inner: Mutex<PerfState>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, f64>,
    span_counts: HashMap<String, u64>,
    count_totals: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                span_counts: HashMap::new(),
                count_totals: HashMap::new(),
            }),
        })
    }

    pub fn log_span_ms(&self, name: &str, doc_id: Option<usize>, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "doc_id": doc_id,
            "unit": "ms",
            "ms": round3(ms),
        });
        if let Ok(mut state) = self.inner.lock() {
            *state.span_totals.entry(name.to_string()).or_insert(0.0) += ms;
            let entry = state.span_counts.entry(name.to_string()).or_insert(0);
            *entry = entry.saturating_add(1);
            let _ = writeln!(state.writer, "{line}");
        }
    }

    /// Time `f` and log it as a span.
    pub fn time<T>(&self, name: &str, doc_id: Option<usize>, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let value = f();
        self.log_span_ms(name, doc_id, started.elapsed().as_secs_f64() * 1000.0);
        value
    }

    pub fn log_counts(&self, name: &str, doc_id: Option<usize>, counts: &[(&str, u64)]) {
        let fields: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect();
        let line = json!({
            "type": "perf.counts",
            "name": name,
            "doc_id": doc_id,
            "counts": fields,
        });
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let entry = state.count_totals.entry(format!("{name}.{key}")).or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Ok(file) = File::create(hot_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &f64)> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (rank, (name, ms)) in spans.into_iter().take(HOT_LIMIT).enumerate() {
            let count = self.span_counts.get(name).copied().unwrap_or(1).max(1);
            let line = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "name": name,
                "unit": "ms",
                "agg": "sum",
                "ms": round3(*ms),
                "count": count,
                "avg_ms": round3(ms / count as f64),
            });
            let _ = writeln!(writer, "{line}");
        }

        let mut counts: Vec<(&String, &u64)> = self.count_totals.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, value)) in counts.into_iter().take(HOT_LIMIT).enumerate() {
            let line = json!({
                "type": "perf.hot.count",
                "rank": rank + 1,
                "name": name,
                "value": value,
            });
            let _ = writeln!(writer, "{line}");
        }
    }
}

fn round3(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

fn hot_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("docpress_perf.log");
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    path.with_file_name(format!("{stem}_hot.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .expect("read log")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn spans_and_counts_are_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("perf.log");
        {
            let perf = PerfLogger::new(&path).expect("create");
            perf.log_span_ms("compose", Some(0), 1.5);
            perf.log_span_ms("compose", Some(1), 2.5);
            perf.log_span_ms("render", None, 10.0);
            perf.log_counts("outline", Some(0), &[("entries", 4)]);
            let doubled = perf.time("outline", Some(0), || 21 * 2);
            assert_eq!(doubled, 42);
        }

        let log = lines(&path);
        assert_eq!(log.len(), 5);
        assert_eq!(log[0]["type"], "perf.span");
        assert_eq!(log[0]["name"], "compose");
        assert_eq!(log[2]["doc_id"], Value::Null);
        assert_eq!(log[3]["counts"]["entries"], 4);

        let hot = lines(&dir.path().join("perf_hot.log"));
        assert_eq!(hot[0]["type"], "perf.hot.span");
        assert_eq!(hot[0]["name"], "render");
        let compose = hot
            .iter()
            .find(|line| line["name"] == "compose")
            .expect("compose summary");
        assert_eq!(compose["count"], 2);
        assert_eq!(compose["avg_ms"], 2.0);
        assert!(hot.iter().any(|line| line["name"] == "outline.entries"));
    }

    #[test]
    fn hot_path_sits_next_to_the_log() {
        assert_eq!(
            hot_path_for(Path::new("/tmp/run/perf.jsonl")),
            PathBuf::from("/tmp/run/perf_hot.log")
        );
        assert_eq!(
            hot_path_for(Path::new("timings")),
            PathBuf::from("timings_hot.log")
        );
    }
}
