use crate::model::ScanReport;
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "File")]
    name: String,
    #[tabled(rename = "SHA-256")]
    hash: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Package")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Release")]
    release: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    println!();
    println!(
        "Scan completed at: {}",
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if !report.files.is_empty() {
        println!("Found {} vulnerable files:", report.files.len());
        println!();

        let rows: Vec<FileRow> = report
            .files
            .iter()
            .map(|v| FileRow {
                name: truncate(&v.name, 60),
                hash: truncate(&v.hash, 16),
                source: v.source.clone(),
                reason: truncate(&v.reason, 50),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
        println!();
    }

    if !report.packages.is_empty() {
        println!("Found {} vulnerable packages:", report.packages.len());
        println!();

        let rows: Vec<PackageRow> = report
            .packages
            .iter()
            .map(|v| PackageRow {
                name: truncate(&v.package.name, 40),
                version: dash_if_empty(&v.package.version),
                release: dash_if_empty(&v.package.release),
                source: v.source.clone(),
                reason: truncate(&v.reason, 50),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors:");
        for error in &report.errors {
            println!("  \x1b[31m{}\x1b[0m", error);
        }
        println!();
    }

    print_summary(report);

    Ok(())
}

fn print_summary(report: &ScanReport) {
    println!("Summary:");
    println!("  Vulnerable files: {}", report.files.len());
    println!("  Vulnerable packages: {}", report.packages.len());
    if !report.errors.is_empty() {
        println!("  Errors: {}", report.errors.len());
    }

    if report.is_clean() {
        println!();
        println!("\x1b[32mNo vulnerabilities found.\x1b[0m");
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

fn dash_if_empty(s: &str) -> String {
    if s.is_empty() {
        "-".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("usr/lib/x86_64-linux-gnu", 10), "usr/lib...");
    }

    #[test]
    fn test_dash_if_empty() {
        assert_eq!(dash_if_empty(""), "-");
        assert_eq!(dash_if_empty("1"), "1");
    }
}
