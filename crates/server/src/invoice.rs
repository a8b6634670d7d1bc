//! Invoice rendering for burn plans.
//!
//! The analysis is rendered into an AWS-styled HTML invoice with Tera and
//! converted to PDF with `wkhtmltopdf` when the binary is on `PATH`. Without
//! it (or when conversion fails) the HTML document is the artifact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use billburn_core::domain::analysis::{LineItem, SpendingAnalysis};
use billburn_core::sigv4::sha256_hex;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

pub const INVOICE_TEMPLATE: &str = "invoice.html";
const ACCOUNT_ID: &str = "123456789012";
const MAX_TYPE_LABEL_CHARS: usize = 20;

const MODEST_PAYMENT_OPTIONS: &[&str] = &[
    "Sell your gaming PC (you won't need it after this bill)",
    "Start a GoFundMe titled 'I Learned About AWS The Hard Way'",
    "Return all those unused AWS certifications for a refund",
    "Convince your manager this was 'research'",
    "Raid your kid's college fund (they can learn to code instead)",
];

const SERIOUS_PAYMENT_OPTIONS: &[&str] = &[
    "Take out a second mortgage on your house",
    "Sell the CFO's shares (they'll understand... eventually)",
    "Liquidate your 401(k) - retirement is overrated anyway",
    "Organize a company bake sale (you'll need about 10,000 cupcakes)",
    "Apply for AWS's 'Most Creative Waste' scholarship",
];

const RUINOUS_PAYMENT_OPTIONS: &[&str] = &[
    "Sell the company (it's worth less than this bill now)",
    "Fake your own death and start fresh in another country",
    "Convince investors this is 'aggressive growth spending'",
    "Start a cryptocurrency called 'RegretCoin'",
    "Apply for witness protection and a new identity",
    "Negotiate a payment plan spanning multiple generations",
];

/// Register custom Tera filters used by the invoice template.
///
/// - `format`: printf-style formatting, e.g. `"%.4f" | format(value=cost)`
/// - `money`:  2-decimal rounding, e.g. `amount | money`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("format", tera_format_filter);
    tera.register_filter("money", tera_money_filter);
}

fn tera_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let format_str = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("format filter expects a string input"))?;
    let number = args
        .get("value")
        .ok_or_else(|| tera::Error::msg("format filter requires a 'value' argument"))
        .map(number_or_zero)?;

    let precision = format_str
        .strip_prefix("%.")
        .and_then(|rest| rest.strip_suffix('f'))
        .and_then(|digits| digits.parse::<usize>().ok());

    Ok(tera::Value::String(match precision {
        Some(precision) => format!("{number:.precision$}"),
        None => number.to_string(),
    }))
}

fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    Ok(tera::Value::String(format!("{:.2}", number_or_zero(value))))
}

fn number_or_zero(value: &tera::Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

#[derive(Debug, thiserror::Error)]
pub enum InvoiceError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered invoice, PDF when conversion succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvoiceArtifact {
    Pdf(Vec<u8>),
    Html(String),
}

impl InvoiceArtifact {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "pdf",
            Self::Html(_) => "html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "application/pdf",
            Self::Html(_) => "text/html; charset=utf-8",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Pdf(bytes) => bytes,
            Self::Html(html) => html.as_bytes(),
        }
    }
}

#[derive(Debug, Serialize)]
struct InvoiceView<'a> {
    invoice_number: String,
    invoice_date: String,
    billing_start: String,
    account_id: &'static str,
    total_amount: &'a str,
    efficiency_level: &'a str,
    architecture_type: String,
    burning_style: String,
    timeline_days: i64,
    deployment_scenario: &'a str,
    lines: Vec<InvoiceLine<'a>>,
    subtotal: f64,
    total_due: f64,
    key_mistakes: &'a [String],
    recommendations: &'a [String],
    roast: &'a str,
    payment_options: &'static [&'static str],
    generated_at: String,
}

#[derive(Debug, Serialize)]
struct InvoiceLine<'a> {
    service_name: &'a str,
    instance_type: String,
    quantity: u32,
    days: String,
    unit_cost: f64,
    total_cost: f64,
}

#[derive(Clone, Debug)]
pub struct InvoiceRenderer {
    tera: Tera,
    wkhtmltopdf_path: Option<PathBuf>,
}

impl InvoiceRenderer {
    /// Embedded template plus `wkhtmltopdf` from `PATH` when installed.
    pub fn new() -> Result<Self, InvoiceError> {
        let mut renderer = Self::html_only()?;
        renderer.wkhtmltopdf_path = which::which("wkhtmltopdf").ok();

        match &renderer.wkhtmltopdf_path {
            Some(path) => info!(
                event_name = "invoice.renderer.pdf_enabled",
                path = %path.display(),
                "wkhtmltopdf found"
            ),
            None => warn!(
                event_name = "invoice.renderer.html_only",
                "wkhtmltopdf not found in PATH - invoices will be uploaded as HTML"
            ),
        }
        Ok(renderer)
    }

    pub fn html_only() -> Result<Self, InvoiceError> {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);
        tera.add_raw_template(
            INVOICE_TEMPLATE,
            include_str!("../../../templates/invoice.html.tera"),
        )
        .map_err(|error| InvoiceError::Template(error.to_string()))?;

        Ok(Self { tera, wkhtmltopdf_path: None })
    }

    pub fn pdf_enabled(&self) -> bool {
        self.wkhtmltopdf_path.is_some()
    }

    pub fn render_html(
        &self,
        analysis: &SpendingAnalysis,
        issued_at: DateTime<Utc>,
    ) -> Result<String, InvoiceError> {
        let billing_start = TimeDelta::try_days(analysis.timeline_days)
            .and_then(|period| issued_at.checked_sub_signed(period))
            .unwrap_or(issued_at);

        let view = InvoiceView {
            invoice_number: invoice_number(&analysis.total_amount, issued_at),
            invoice_date: issued_at.format("%B %d, %Y").to_string(),
            billing_start: billing_start.format("%B %d, %Y").to_string(),
            account_id: ACCOUNT_ID,
            total_amount: &analysis.total_amount,
            efficiency_level: &analysis.efficiency_level,
            architecture_type: title_case(&analysis.architecture_type),
            burning_style: title_case(&analysis.burning_style),
            timeline_days: analysis.timeline_days,
            deployment_scenario: &analysis.deployment_scenario,
            lines: analysis
                .services_deployed
                .iter()
                .map(|item| InvoiceLine {
                    service_name: &item.service_name,
                    instance_type: truncate_label(&item.instance_type),
                    quantity: item.quantity,
                    days: billed_days(item, analysis.timeline_days),
                    unit_cost: item.unit_cost,
                    total_cost: item.total_cost,
                })
                .collect(),
            subtotal: analysis.total_calculated_cost,
            total_due: analysis.total_calculated_cost,
            key_mistakes: &analysis.key_mistakes,
            recommendations: &analysis.recommendations,
            roast: &analysis.roast,
            payment_options: payment_options(analysis.total_calculated_cost),
            generated_at: issued_at.format("%B %d, %Y at %I:%M %p").to_string(),
        };

        let mut context = Context::new();
        context.insert("invoice", &view);
        self.tera
            .render(INVOICE_TEMPLATE, &context)
            .map_err(|error| InvoiceError::Template(error.to_string()))
    }

    pub async fn render(
        &self,
        analysis: &SpendingAnalysis,
    ) -> Result<InvoiceArtifact, InvoiceError> {
        let html = self.render_html(analysis, Utc::now())?;

        let Some(wkhtmltopdf) = &self.wkhtmltopdf_path else {
            return Ok(InvoiceArtifact::Html(html));
        };
        match convert_html_to_pdf(&html, wkhtmltopdf).await {
            Ok(pdf_bytes) => Ok(InvoiceArtifact::Pdf(pdf_bytes)),
            Err(error) => {
                warn!(
                    event_name = "invoice.pdf.fallback",
                    error = %error,
                    "PDF conversion failed, falling back to HTML"
                );
                Ok(InvoiceArtifact::Html(html))
            }
        }
    }
}

async fn convert_html_to_pdf(html: &str, wkhtmltopdf_path: &Path) -> Result<Vec<u8>, InvoiceError> {
    let temp_dir = std::env::temp_dir();
    let stem = format!("invoice_{}", uuid::Uuid::new_v4());
    let html_path = temp_dir.join(format!("{stem}.html"));
    let pdf_path = temp_dir.join(format!("{stem}.pdf"));

    tokio::fs::write(&html_path, html).await?;

    let output = Command::new(wkhtmltopdf_path)
        .args(["--page-size", "Letter"])
        .args(["--margin-top", "12mm", "--margin-bottom", "12mm"])
        .args(["--margin-left", "10mm", "--margin-right", "10mm"])
        .args(["--encoding", "utf-8", "--quiet"])
        .arg(&html_path)
        .arg(&pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let result = match output {
        Ok(output) if output.status.success() => {
            tokio::fs::read(&pdf_path).await.map_err(Into::into)
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(event_name = "invoice.pdf.failed", stderr = %stderr, "wkhtmltopdf failed");
            Err(InvoiceError::Conversion(stderr))
        }
        Err(error) => Err(error.into()),
    };

    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    if let Ok(bytes) = &result {
        info!(event_name = "invoice.pdf.generated", size = bytes.len(), "PDF generated");
    }
    result
}

/// `INV-YYYYMMDD-NNNN`, where `NNNN` is derived from the requested amount.
pub fn invoice_number(total_amount: &str, issued_at: DateTime<Utc>) -> String {
    let digest = sha256_hex(total_amount.as_bytes());
    let suffix = u32::from_str_radix(&digest[..8], 16).unwrap_or(0) % 10_000;
    format!("INV-{}-{suffix:04}", issued_at.format("%Y%m%d"))
}

pub fn payment_options(total_cost: f64) -> &'static [&'static str] {
    if total_cost < 1_000.0 {
        MODEST_PAYMENT_OPTIONS
    } else if total_cost < 5_000.0 {
        SERIOUS_PAYMENT_OPTIONS
    } else {
        RUINOUS_PAYMENT_OPTIONS
    }
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() > MAX_TYPE_LABEL_CHARS {
        let head: String = label.chars().take(MAX_TYPE_LABEL_CHARS).collect();
        format!("{head}...")
    } else {
        label.to_string()
    }
}

fn billed_days(item: &LineItem, timeline_days: i64) -> String {
    if item.duration_used.contains("entire") {
        return timeline_days.to_string();
    }
    match item.duration_used.split_whitespace().next() {
        Some(first) if first.parse::<f64>().is_ok() => first.to_string(),
        _ => (item.effective_end_day(timeline_days) - item.start_day).max(0).to_string(),
    }
}

fn title_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use billburn_core::domain::analysis::{LineItem, SpendingAnalysis};
    use chrono::{TimeZone, Utc};

    use super::{
        billed_days, invoice_number, payment_options, truncate_label, InvoiceArtifact,
        InvoiceRenderer,
    };

    fn item(name: &str, instance_type: &str, total: f64, duration: &str) -> LineItem {
        LineItem {
            service_name: name.to_string(),
            instance_type: instance_type.to_string(),
            quantity: 4,
            unit_cost: 1.5,
            total_cost: total,
            start_day: 5,
            end_day: -1,
            duration_used: duration.to_string(),
            usage_pattern: "always on".to_string(),
            waste_factor: "nobody checked".to_string(),
            roast: None,
        }
    }

    fn analysis(total: f64) -> SpendingAnalysis {
        SpendingAnalysis {
            total_amount: "$3000".to_string(),
            timeline_days: 30,
            efficiency_level: "Brain damage".to_string(),
            architecture_type: "kubernetes".to_string(),
            burning_style: "horizontal".to_string(),
            services_deployed: vec![
                item(
                    "Amazon EKS",
                    "control plane x12 clusters in every region",
                    total / 2.0,
                    "entire timeline",
                ),
                item("Amazon EC2", "m5.large", total / 2.0, "25 days"),
            ],
            total_calculated_cost: total,
            deployment_scenario: "Twelve clusters, one pod.".to_string(),
            key_mistakes: vec!["One cluster per developer".to_string()],
            recommendations: vec!["Use namespaces".to_string()],
            roast: "<b>Truly</b> inspired.".to_string(),
        }
    }

    #[test]
    fn invoice_html_holds_charges_totals_and_escaped_commentary() {
        let renderer = InvoiceRenderer::html_only().expect("renderer");
        let issued_at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).single().expect("time");

        let html = renderer.render_html(&analysis(2950.0), issued_at).expect("render");

        assert!(html.contains(&invoice_number("$3000", issued_at)));
        assert!(html.contains("February 12, 2025 - March 14, 2025"));
        assert!(html.contains("control plane x12 cl..."));
        assert!(html.contains("$1.5000"));
        assert!(html.contains("$1475.00"));
        assert!(html.contains("$2950.00"));
        assert!(html.contains("Kubernetes"));
        assert!(html.contains("Take out a second mortgage"));
        assert!(html.contains("&lt;b&gt;Truly&lt;&#x2F;b&gt; inspired."));
    }

    #[tokio::test]
    async fn render_without_wkhtmltopdf_returns_html_artifact() {
        let renderer = InvoiceRenderer::html_only().expect("renderer");
        assert!(!renderer.pdf_enabled());

        let artifact = renderer.render(&analysis(100.0)).await.expect("render");
        assert!(matches!(artifact, InvoiceArtifact::Html(ref html) if html.contains("INVOICE")));
        assert_eq!(artifact.extension(), "html");
        assert_eq!(artifact.content_type(), "text/html; charset=utf-8");
    }

    #[test]
    fn invoice_number_is_stable_per_amount_and_day() {
        let issued_at = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).single().expect("time");
        let number = invoice_number("$1000", issued_at);

        assert_eq!(number, invoice_number("$1000", issued_at));
        assert!(number.starts_with("INV-20250102-"));
        assert_eq!(number.len(), "INV-20250102-0000".len());
    }

    #[test]
    fn payment_tier_follows_total_cost() {
        assert!(payment_options(999.99)[0].contains("gaming PC"));
        assert!(payment_options(1_000.0)[0].contains("second mortgage"));
        assert!(payment_options(4_999.0)[0].contains("second mortgage"));
        assert!(payment_options(5_000.0)[0].contains("Sell the company"));
    }

    #[test]
    fn labels_and_days_are_normalised_for_the_table() {
        assert_eq!(truncate_label("m5.large"), "m5.large");
        assert_eq!(truncate_label("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnopqrst...");

        assert_eq!(billed_days(&item("S3", "std", 1.0, "entire timeline"), 30), "30");
        assert_eq!(billed_days(&item("S3", "std", 1.0, "12 days"), 30), "12");
        assert_eq!(billed_days(&item("S3", "std", 1.0, "most of it"), 30), "25");
    }
}
