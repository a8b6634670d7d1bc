use std::fmt::Write as _;

use crate::domain::analysis::{LineItem, SpendingAnalysis};

const RULE_WIDTH: usize = 80;

fn day_label(item: &LineItem, timeline_days: i64) -> (String, String) {
    let start = format!("Day {}", item.start_day.max(0));
    let end = if item.runs_to_end() {
        format!("Day {timeline_days} (end)")
    } else {
        format!("Day {}", item.end_day)
    };
    (start, end)
}

/// Renders the plain-text forensic report printed by `billburn plan --report`.
pub fn format_report(analysis: &SpendingAnalysis) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::with_capacity(4096);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "AWS SPENDING FORENSICS ANALYSIS");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);
    let _ = writeln!(out, "ANALYSIS PARAMETERS:");
    let _ = writeln!(out, "  - Amount Spent: {}", analysis.total_amount);
    let _ = writeln!(out, "  - Timeline: {} days", analysis.timeline_days);
    let _ = writeln!(out, "  - Efficiency Level: {}", analysis.efficiency_level);
    let _ = writeln!(out, "  - Architecture Type: {}", analysis.architecture_type);
    let _ = writeln!(out, "  - Burning Style: {}", analysis.burning_style);
    let _ = writeln!(out, "  - Calculated Total: ${:.2}", analysis.total_calculated_cost);
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);
    let _ = writeln!(out, "SERVICES DEPLOYED:");

    for item in &analysis.services_deployed {
        let (start, end) = day_label(item, analysis.timeline_days);
        let _ = writeln!(out);
        let _ = writeln!(out, "  * {}", item.service_name);
        let _ = writeln!(out, "     Instance/Type: {}", item.instance_type);
        let _ = writeln!(out, "     Quantity: {}", item.quantity);
        let _ = writeln!(out, "     Start: {start}");
        let _ = writeln!(out, "     End: {end}");
        let _ = writeln!(out, "     Duration: {}", item.duration_used);
        let _ = writeln!(out, "     Unit Cost: ${:.4}", item.unit_cost);
        let _ = writeln!(out, "     Total Cost: ${:.2}", item.total_cost);
        let _ = writeln!(out, "     Usage: {}", item.usage_pattern);
        let _ = writeln!(out, "     Waste Factor: {}", item.waste_factor);
        if let Some(roast) = &item.roast {
            let _ = writeln!(out, "     Roast: {roast}");
        }
    }

    let sections: [(&str, Vec<String>); 4] = [
        ("DEPLOYMENT SCENARIO:", vec![analysis.deployment_scenario.clone()]),
        (
            "KEY MISTAKES:",
            analysis.key_mistakes.iter().map(|mistake| format!("  x {mistake}")).collect(),
        ),
        (
            "RECOMMENDATIONS:",
            analysis.recommendations.iter().map(|rec| format!("  + {rec}")).collect(),
        ),
        ("THE ROAST", vec![analysis.roast.clone()]),
    ];

    for (title, lines) in sections {
        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out);
        let _ = writeln!(out, "{title}");
        let _ = writeln!(out);
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
    }

    let _ = writeln!(out);
    let _ = write!(out, "{rule}");
    out
}

#[cfg(test)]
mod tests {
    use super::format_report;
    use crate::domain::analysis::fixtures::analysis;

    #[test]
    fn report_renders_end_sentinel_as_timeline_end() {
        let report = format_report(&analysis());
        assert!(report.contains("End: Day 30 (end)"));
        assert!(report.contains("Start: Day 3"));
        assert!(report.contains("End: Day 30\n"));
    }

    #[test]
    fn report_lists_parameters_findings_and_roast() {
        let report = format_report(&analysis());
        assert!(report.contains("Amount Spent: $1000"));
        assert!(report.contains("Calculated Total: $1000.50"));
        assert!(report.contains("Unit Cost: $300.0000"));
        assert!(report.contains("  x two"));
        assert!(report.contains("  + turn it off"));
        assert!(report.contains("THE ROAST\n\nImpressive."));
    }
}
