use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use tracing::{info, warn};

use crate::domain::DailyReport;

/// Collects `YYYY-MM-DD.md` reports, newest first.
///
/// A missing directory yields no reports; unreadable files are skipped.
pub fn collect(dir: &Path) -> Vec<DailyReport> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "reports.dir_missing");
        return Vec::new();
    }
    match try_collect(dir) {
        Ok(reports) => {
            info!(count = reports.len(), "reports.collected");
            reports
        }
        Err(err) => {
            warn!(dir = %dir.display(), error = %format!("{err:#}"), "reports.scan_failed");
            Vec::new()
        }
    }
}

fn try_collect(dir: &Path) -> Result<Vec<DailyReport>> {
    let re = Regex::new(r"^(\d{4}-\d{2}-\d{2})\.md$")?;
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if re.is_match(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort_unstable_by(|a, b| b.cmp(a));

    let mut reports = Vec::new();
    for name in names {
        let date = &name[..name.len() - ".md".len()];
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            continue;
        }
        let path = dir.join(&name);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "reports.read_failed");
                continue;
            }
        };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }
        reports.push(DailyReport {
            date: date.to_string(),
            content: content.to_string(),
        });
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_invalid_dates_and_blank_files_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let d = tmp.path();
        fs::write(d.join("2024-02-28.md"), "# day one\n\nbought SOL\n").unwrap();
        fs::write(d.join("2024-03-01.md"), "  later  ").unwrap();
        fs::write(d.join("2024-02-30.md"), "impossible date").unwrap();
        fs::write(d.join("2024-02-29.md"), " \n\t\n").unwrap();
        fs::write(d.join("notes.md"), "not a report").unwrap();
        fs::write(d.join("2024-01-01.txt"), "wrong extension").unwrap();

        let reports = collect(d);

        assert_eq!(
            reports,
            vec![
                DailyReport { date: "2024-03-01".into(), content: "later".into() },
                DailyReport { date: "2024-02-28".into(), content: "# day one\n\nbought SOL".into() },
            ]
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(collect(&tmp.path().join("memory")).is_empty());
    }
}
