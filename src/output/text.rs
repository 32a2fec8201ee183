use crate::model::ScanReport;
use anyhow::Result;

/// Match lines go to stdout; errors and the summary go to stderr.
pub fn print_text(report: &ScanReport) -> Result<()> {
    for error in &report.errors {
        eprintln!("microscope: {}", error);
    }
    print!("{}", generate_text_string(report));
    eprintln!("microscope: {}", summary_line(report));
    Ok(())
}

/// File matches first, then package matches, one tab-separated line each.
pub fn generate_text_string(report: &ScanReport) -> String {
    let mut out = String::new();
    for vuln in &report.files {
        out.push_str(&vuln.to_string());
        out.push('\n');
    }
    for vuln in &report.packages {
        out.push_str(&vuln.to_string());
        out.push('\n');
    }
    out
}

pub(crate) fn summary_line(report: &ScanReport) -> String {
    format!(
        "{} errors, {} vulns",
        report.errors.len(),
        report.vulnerability_count()
    )
}
