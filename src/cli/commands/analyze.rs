//! One-off analysis command (nothing is stored)

use std::sync::Arc;

use colored::Colorize;

use crate::config::StaticConfig;
use crate::errors::Result;
use crate::services::{
    AnalysisService, Evaluation, GeoIpProvider, STATUS_PRIVATE, ThreatScorer, TracingAlertSink,
};
use crate::storage::AnalysisEntry;

pub async fn analyze(config: &StaticConfig, ips: &[String], json: bool) -> Result<()> {
    let service = AnalysisService::detached(
        GeoIpProvider::new(&config.geoip),
        Arc::new(ThreatScorer::new(&config.threat)),
        Arc::new(TracingAlertSink),
        config,
    );

    let evaluation = service.evaluate(ips).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        print!("{}", render_table(&evaluation));
    }
    Ok(())
}

fn colored_level(level: &str) -> colored::ColoredString {
    match level {
        "high" => level.red().bold(),
        "medium" => level.yellow(),
        _ => level.green(),
    }
}

fn location(entry: &AnalysisEntry) -> String {
    if entry.status == STATUS_PRIVATE {
        return "private".to_string();
    }
    let parts: Vec<&str> = [entry.city.as_deref(), entry.country_code.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}

/// 文本表格输出
pub fn render_table(evaluation: &Evaluation) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<40} {:<8} {:<24} {:<28} {:>5}  {}\n",
        "IP".bold(),
        "STATUS".bold(),
        "LOCATION".bold(),
        "ISP".bold(),
        "SCORE".bold(),
        "LEVEL".bold()
    ));

    for entry in &evaluation.results {
        let isp: String = entry.isp.as_deref().unwrap_or("-").chars().take(28).collect();
        out.push_str(&format!(
            "{:<40} {:<8} {:<24} {:<28} {:>5}  {}\n",
            entry.ip_address,
            entry.status,
            location(entry),
            isp,
            entry.threat_score,
            colored_level(&entry.threat_level)
        ));
        for check in &entry.checks {
            out.push_str(&format!(
                "    {} {} (+{})\n",
                "-".dimmed(),
                check.detail,
                check.weight
            ));
        }
    }

    let s = &evaluation.summary;
    out.push_str(&format!(
        "\n{} total, {} high, {} medium, {} low ({} failed, {} private)\n",
        s.total,
        s.high.to_string().red(),
        s.medium.to_string().yellow(),
        s.low.to_string().green(),
        s.failed,
        s.private
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::AnalysisSummary;

    fn entry(ip: &str, status: &str, level: &str) -> AnalysisEntry {
        AnalysisEntry {
            ip_address: ip.to_string(),
            status: status.to_string(),
            message: None,
            country: None,
            country_code: Some("DE".into()),
            region: None,
            city: Some("Frankfurt".into()),
            latitude: None,
            longitude: None,
            timezone: None,
            isp: Some("Hetzner Online GmbH".into()),
            org: None,
            as_number: None,
            as_name: None,
            threat_score: 40,
            threat_level: level.to_string(),
            checks: Vec::new(),
            reputation_links: Vec::new(),
        }
    }

    #[test]
    fn test_render_table_lists_every_entry() {
        colored::control::set_override(false);
        let results = vec![
            entry("203.0.113.7", "success", "medium"),
            entry("10.0.0.1", STATUS_PRIVATE, "low"),
        ];
        let evaluation = Evaluation {
            summary: AnalysisSummary::from_entries(&results),
            results,
        };

        let table = render_table(&evaluation);
        assert!(table.contains("203.0.113.7"));
        assert!(table.contains("Frankfurt, DE"));
        assert!(table.contains("private"));
        assert!(table.contains("2 total, 0 high, 1 medium, 1 low"));
    }
}
