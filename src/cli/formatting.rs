use colored::{ColoredString, Colorize};

use crate::analysis::{
    Anomaly, AnomalyExplanation, AnomalyKind, CostTrendResult, PeriodChange, PeriodComparison, Severity, TrendRow,
};

pub fn format_currency(value: Option<f64>) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

pub fn format_pct(value: Option<f64>) -> String {
    match value {
        None => "-".to_string(),
        Some(v) if v > 0.0 => format!("+{:.1}%", v),
        Some(v) => format!("{:.1}%", v),
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.as_str().to_uppercase();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::Warning => label.yellow(),
        Severity::Info => label.cyan(),
    }
}

/// Point anomalies show the z-score, trend anomalies the drift as a percentage.
fn magnitude(anomaly: &Anomaly) -> String {
    match anomaly.kind() {
        AnomalyKind::Point => format!("z {:+.2}", anomaly.z_score()),
        AnomalyKind::Trend => format!("drift {:+.1}%", anomaly.z_score() * 100.0),
    }
}

pub fn print_anomalies_table(anomalies: &[Anomaly]) {
    if anomalies.is_empty() {
        println!("{}", "No anomalies detected.".green());
        return;
    }

    println!("{}", "Cost Anomalies Detected".bold());
    println!(
        "{:<10} {:<11} {:<40} {:>14} {:>14} {:>14} {:<10}",
        "Severity", "Date", "Dimension", "Current Cost", "Median Cost", "Magnitude", "Direction"
    );
    for a in anomalies {
        // Pad before colouring, escape codes throw off width.
        let severity = format!("{:<10}", a.severity.as_str().to_uppercase());
        let severity = match a.severity {
            Severity::Critical => severity.red().bold(),
            Severity::Warning => severity.yellow(),
            Severity::Info => severity.cyan(),
        };
        println!(
            "{} {:<11} {:<40} {:>14} {:>14} {:>14} {:<10}",
            severity,
            a.usage_date.to_string(),
            format!("{}={}", a.group_by, a.group_value),
            format_currency(Some(a.current_cost)),
            format_currency(Some(a.median_cost)),
            magnitude(a),
            a.direction.as_str(),
        );
    }

    let critical = anomalies.iter().filter(|a| a.severity == Severity::Critical).count();
    println!(
        "\n{} {}",
        format!("{} anomaly(ies) found.", anomalies.len()).dimmed(),
        if critical > 0 {
            format!("{} {}", critical, severity_label(Severity::Critical))
        } else {
            String::new()
        }
    );
}

pub fn print_trends_table(trends: &[TrendRow], group_label: &str) {
    if trends.is_empty() {
        println!("{}", "No cost data in the requested window.".yellow());
        return;
    }

    println!("{}", "Daily Cost Trends".bold());
    println!(
        "{:<11} {:<32} {:>14} {:>14} {:>10}",
        "Date", group_label, "Cost", "Change", "% Change"
    );
    for row in trends {
        let change = format!("{:>14}", format_currency(row.cost_change));
        let pct = format!("{:>10}", format_pct(row.pct_change));
        let (change, pct) = match row.cost_change {
            Some(c) if c > 0.0 => (change.red(), pct.red()),
            Some(c) if c < 0.0 => (change.green(), pct.green()),
            _ => (change.normal(), pct.normal()),
        };
        println!(
            "{:<11} {:<32} {:>14} {} {}",
            row.usage_date.to_string(),
            row.group_value,
            format_currency(Some(row.total_cost)),
            change,
            pct,
        );
    }
}

fn print_change_rows(title: &str, changes: &[PeriodChange]) {
    if changes.is_empty() {
        return;
    }
    println!("\n{}", title.bold());
    for c in changes {
        let change = format!("{:>14}", format_currency(Some(c.absolute_change)));
        let change = if c.absolute_change > 0.0 { change.red() } else { change.green() };
        println!(
            "{:<40} {:>14} {:>14} {} {:>10}",
            c.group_value,
            format_currency(Some(c.period_a_cost)),
            format_currency(Some(c.period_b_cost)),
            change,
            format_pct(c.pct_change),
        );
    }
}

pub fn print_comparison(cmp: &PeriodComparison) {
    let (a_start, a_end) = cmp.period_a;
    let (b_start, b_end) = cmp.period_b;
    println!(
        "{}",
        format!("Cost by {}: {} to {} vs {} to {}", cmp.dimension, a_start, a_end, b_start, b_end).bold()
    );
    let delta = cmp.period_b_total - cmp.period_a_total;
    let pct = (cmp.period_a_total != 0.0).then(|| delta / cmp.period_a_total * 100.0);
    println!(
        "Total: {} -> {} ({}, {})",
        format_currency(Some(cmp.period_a_total)),
        format_currency(Some(cmp.period_b_total)),
        format_currency(Some(delta)),
        format_pct(pct),
    );
    println!(
        "\n{:<40} {:>14} {:>14} {:>14} {:>10}",
        cmp.dimension.name(), "Period A", "Period B", "Change", "% Change"
    );
    print_change_rows("Top movers", &cmp.movers);
    print_change_rows("New in period B", &cmp.new_in_b);
    print_change_rows("Gone in period B", &cmp.disappeared_from_a);
}

pub fn print_cost_trend(trend: &CostTrendResult) {
    if trend.points.is_empty() {
        println!("{}", "No cost data in the requested window.".yellow());
        return;
    }

    println!(
        "{}",
        format!("{} costs, {} to {}", trend.granularity, trend.date_start, trend.date_end).bold()
    );
    for point in &trend.points {
        println!(
            "{:<11} {:<32} {:>14}",
            point.usage_date.to_string(),
            point.group_value.as_deref().unwrap_or("total"),
            format_currency(Some(point.cost)),
        );
    }
    println!(
        "\n{}",
        format!(
            "Total {}, average {}, min {}, max {}",
            format_currency(Some(trend.total)),
            format_currency(Some(trend.average)),
            format_currency(Some(trend.min_cost)),
            format_currency(Some(trend.max_cost)),
        )
        .dimmed()
    );
}

pub fn print_explanation(e: &AnomalyExplanation) {
    let group = match &e.account_id {
        Some(account) => format!("{} / {}", e.service, account),
        None => e.service.clone(),
    };
    println!("{}", format!("{} on {}", group, e.anomaly_date).bold());
    println!("  Cost:            {}", format_currency(Some(e.anomaly_cost)));
    if e.has_baseline {
        println!(
            "  Baseline ({}d):   median {}, range {} to {}",
            e.baseline_days,
            format_currency(Some(e.baseline_median)),
            format_currency(Some(e.baseline_min)),
            format_currency(Some(e.baseline_max)),
        );
        println!(
            "  Vs median:       {} ({:.1}x)",
            format_currency(Some(e.cost_vs_median)),
            e.cost_multiple
        );
    } else {
        println!("  {}", "No cost in the baseline window.".yellow());
    }
    let status = if e.is_ongoing {
        format!("ONGOING, {} of {} later day(s) elevated", e.elevated_days_after, e.days_observed_after).red()
    } else {
        format!("not ongoing ({} later day(s) observed)", e.days_observed_after).green()
    };
    println!("  Status:          {}", status);
}
