use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context as _;
use pullr_core::TestReport;

/// Characters that cannot appear in a result file name. Runs are collapsed
/// to a single character before each survivor becomes a `-`.
const FORBIDDEN: &[char] = &['\\', '/', ':', '?', '"', '<', '>', '|'];

/// Write one CSV per tested URL into `dir`.
pub(crate) fn export(report: &TestReport, dir: &Path) -> anyhow::Result<()> {
    for stats in &report.per_url {
        let path = dir.join(file_name(&stats.url));
        let mut out = BufWriter::new(
            File::create(&path).with_context(|| format!("create {}", path.display()))?,
        );
        stats
            .summary
            .write_csv(&mut out)
            .with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

pub(crate) fn file_name(url: &str) -> String {
    sanitize(&format!("{url}.csv"))
}

fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_forbidden = false;

    for ch in name.chars() {
        let forbidden = FORBIDDEN.contains(&ch);
        if forbidden && prev_forbidden {
            continue;
        }
        out.push(if forbidden { '-' } else { ch });
        prev_forbidden = forbidden;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pullr_core::{Summary, UrlStats};

    #[test]
    fn forbidden_runs_collapse_then_become_dashes() {
        assert_eq!(
            file_name("http://files.example/a/b"),
            "http-files.example-a-b.csv"
        );
        assert_eq!(file_name("http://h:8080/x?q=1"), "http-h-8080-x-q=1.csv");
        assert_eq!(sanitize("plain.csv"), "plain.csv");
        assert_eq!(sanitize(r#"a\\//::b"#), "a-b");
    }

    #[test]
    fn export_writes_one_file_per_url() {
        let mut summary = Summary::default();
        summary.update_resolving(4, true);
        summary.update_connecting(9, true);

        let report = TestReport {
            overall: Summary::default(),
            per_url: vec![UrlStats {
                url: Arc::from("http://files.example/clip"),
                summary,
            }],
            interrupted: false,
        };

        let dir = tempfile::tempdir().unwrap();
        export(&report, dir.path()).unwrap();

        let path = dir.path().join("http-files.example-clip.csv");
        let text = std::fs::read_to_string(path).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "resolve cost (ms),connect cost (ms),recvhdr cost (ms),1stchunk cost (ms)"
        );
        assert_eq!(lines.next().unwrap(), "4,9,,");
        assert_eq!(lines.next(), None);
    }
}
