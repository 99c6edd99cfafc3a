//! Document model consumed by the export pipeline.
//!
//! Documents are read-only snapshots handed over by the data layer. They are
//! deserialised from JSON (`"type": "invoice"` or `"type": "order_form"`) and
//! dispatched on by exhaustive matching, never by probing for fields.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// An amount in minor currency units (cents).
///
/// In JSON it is written in major units (`150.25`) and rounded to the nearest
/// cent on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_major(amount: f64) -> Self {
        Money((amount * 100.0).round() as i64)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// `self × factor`, rounded half away from zero to whole cents.
    pub fn scale(self, factor: f64) -> Money {
        Money((self.0 as f64 * factor).round() as i64)
    }

    /// Format with a currency symbol and thousands separators, e.g. `$9,000.00`.
    pub fn format(self, currency: &str) -> String {
        let negative = self.0 < 0;
        let abs = self.0.unsigned_abs();
        let major = abs / 100;
        let minor = abs % 100;

        let digits = major.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        let sign = if negative { "-" } else { "" };
        match currency_symbol(currency) {
            Some(symbol) => format!("{sign}{symbol}{grouped}.{minor:02}"),
            None => format!("{sign}{} {grouped}.{minor:02}", currency.to_uppercase()),
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0 as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let major = f64::deserialize(deserializer)?;
        Ok(Money::from_major(major))
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "USD" | "CAD" | "AUD" | "NZD" => Some("$"),
        "EUR" => Some("\u{20AC}"),
        "GBP" => Some("\u{00A3}"),
        "JPY" => Some("\u{00A5}"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Line items and totals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: Money,
}

impl LineItem {
    pub fn amount(&self) -> Money {
        self.unit_price.scale(self.quantity)
    }
}

/// Document totals in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl Totals {
    /// Discount applies to the subtotal; tax applies to the discounted amount.
    pub fn compute(items: &[LineItem], discount_percent: f64, tax_rate_percent: f64) -> Self {
        let subtotal: Money = items.iter().map(LineItem::amount).sum();
        let discount = subtotal.scale(discount_percent.clamp(0.0, 100.0) / 100.0);
        let taxable = subtotal - discount;
        let tax = taxable.scale(tax_rate_percent.max(0.0) / 100.0);
        Totals {
            subtotal,
            discount,
            tax,
            total: taxable + tax,
        }
    }
}

// ---------------------------------------------------------------------------
// Templates, customers and branding
// ---------------------------------------------------------------------------

/// A reusable cover page shown before an MSA body.
///
/// `title`, `subtitle` and `body` may contain `{{placeholders}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverPageTemplate {
    pub id: String,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_true")]
    pub show_logo: bool,
    /// Hex colour for the title band, e.g. `#1a365d`.
    #[serde(default)]
    pub background_color: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl Address {
    /// Non-empty display lines, e.g. `["123 Business St", "New York, NY 10001"]`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.line1.is_empty() {
            lines.push(self.line1.clone());
        }
        if let Some(l2) = self.line2.as_deref().filter(|s| !s.is_empty()) {
            lines.push(l2.to_string());
        }
        let mut locality = self.city.clone();
        if let Some(state) = self.state.as_deref().filter(|s| !s.is_empty()) {
            if !locality.is_empty() {
                locality.push_str(", ");
            }
            locality.push_str(state);
        }
        if !self.postal_code.is_empty() {
            if !locality.is_empty() {
                locality.push(' ');
            }
            locality.push_str(&self.postal_code);
        }
        if !locality.is_empty() {
            lines.push(locality);
        }
        if !self.country.is_empty() {
            lines.push(self.country.clone());
        }
        lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join(", "))
    }
}

/// Display-only customer attributes used to fill the rendered views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Company branding from the admin settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branding {
    pub company_name: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub email: Option<String>,
    /// Logo as a base64 data URI.
    #[serde(default)]
    pub logo: Option<String>,
    /// Hex accent colour used for headings and table headers.
    #[serde(default)]
    pub accent_color: Option<String>,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Legal attachments shared by both document variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachments {
    /// Rich-text Master Service Agreement body.
    #[serde(default)]
    pub msa_content: Option<String>,
    /// Whether a cover page precedes the MSA body.
    #[serde(default)]
    pub include_cover_page: bool,
    #[serde(default)]
    pub cover_page: Option<CoverPageTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvoiceStatus::Draft => "Draft",
            InvoiceStatus::Sent => "Sent",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Overdue => "Overdue",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default)]
    pub tax_rate_percent: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub attachments: Attachments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderForm {
    pub id: String,
    pub order_form_number: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    /// Subscription term in months, if the order is recurring.
    #[serde(default)]
    pub term_months: Option<u32>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default)]
    pub tax_rate_percent: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub attachments: Attachments,
}

/// The document variants the pipeline can export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Document {
    Invoice(Invoice),
    OrderForm(OrderForm),
}

/// Variant tag of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DocumentKind {
    Invoice,
    OrderForm,
}

impl DocumentKind {
    /// Prefix used in export file names.
    pub fn file_prefix(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "Invoice",
            DocumentKind::OrderForm => "OrderForm",
        }
    }

    /// Human-readable title used in rendered views.
    pub fn title(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "Invoice",
            DocumentKind::OrderForm => "Order Form",
        }
    }
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Document::Invoice(_) => DocumentKind::Invoice,
            Document::OrderForm(_) => DocumentKind::OrderForm,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Document::Invoice(i) => &i.id,
            Document::OrderForm(o) => &o.id,
        }
    }

    /// The human-readable number, e.g. `INV-001`.
    pub fn number(&self) -> &str {
        match self {
            Document::Invoice(i) => &i.invoice_number,
            Document::OrderForm(o) => &o.order_form_number,
        }
    }

    pub fn customer_id(&self) -> Option<&str> {
        match self {
            Document::Invoice(i) => i.customer_id.as_deref(),
            Document::OrderForm(o) => o.customer_id.as_deref(),
        }
    }

    pub fn issue_date(&self) -> NaiveDate {
        match self {
            Document::Invoice(i) => i.issue_date,
            Document::OrderForm(o) => o.issue_date,
        }
    }

    pub fn line_items(&self) -> &[LineItem] {
        match self {
            Document::Invoice(i) => &i.line_items,
            Document::OrderForm(o) => &o.line_items,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            Document::Invoice(i) => i.notes.as_deref(),
            Document::OrderForm(o) => o.notes.as_deref(),
        }
    }

    pub fn attachments(&self) -> &Attachments {
        match self {
            Document::Invoice(i) => &i.attachments,
            Document::OrderForm(o) => &o.attachments,
        }
    }

    pub fn totals(&self) -> Totals {
        match self {
            Document::Invoice(i) => {
                Totals::compute(&i.line_items, i.discount_percent, i.tax_rate_percent)
            }
            Document::OrderForm(o) => {
                Totals::compute(&o.line_items, o.discount_percent, o.tax_rate_percent)
            }
        }
    }

    /// MSA body, if present and not blank.
    pub fn msa_content(&self) -> Option<&str> {
        self.attachments()
            .msa_content
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// A cover page is rendered only in front of an MSA body.
    pub fn wants_cover_page(&self) -> bool {
        self.msa_content().is_some() && self.attachments().include_cover_page
    }

    pub fn cover_page(&self) -> Option<&CoverPageTemplate> {
        self.attachments().cover_page.as_ref()
    }

    /// `Invoice_INV-001.pdf`, `OrderForm_OF-002.pdf`.
    pub fn export_file_name(&self) -> String {
        format!("{}_{}.pdf", self.kind().file_prefix(), self.number())
    }

    /// Label used in logs and notifications, e.g. `Invoice INV-001`.
    pub fn label(&self) -> String {
        format!("{} {}", self.kind().file_prefix(), self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(description: &str, quantity: f64, unit_price: f64) -> LineItem {
        LineItem {
            description: description.to_string(),
            quantity,
            unit_price: Money::from_major(unit_price),
        }
    }

    #[test]
    fn totals_apply_discount_before_tax() {
        let items = vec![item("Web Development", 40.0, 150.0), item("Hosting", 1.0, 500.0)];
        let totals = Totals::compute(&items, 10.0, 8.0);
        assert_eq!(totals.subtotal, Money::from_major(6500.0));
        assert_eq!(totals.discount, Money::from_major(650.0));
        assert_eq!(totals.tax, Money::from_major(468.0));
        assert_eq!(totals.total, Money::from_major(6318.0));
    }

    #[test]
    fn money_formatting() {
        assert_eq!(Money::from_major(9000.0).format("USD"), "$9,000.00");
        assert_eq!(Money::from_major(1234567.891).format("eur"), "\u{20AC}1,234,567.89");
        assert_eq!(Money::from_major(-5.5).format("CHF"), "-CHF 5.50");
        assert_eq!(Money::ZERO.format("USD"), "$0.00");
    }

    #[test]
    fn parse_tagged_documents() {
        let json = r#"[
            {"type": "invoice", "id": "i1", "invoice_number": "INV-001",
             "issue_date": "2025-01-15",
             "line_items": [{"description": "Design", "quantity": 2, "unit_price": 125.5}]},
            {"type": "order_form", "id": "o1", "order_form_number": "OF-002",
             "issue_date": "2025-02-01", "msa_content": "<p>Terms</p>",
             "include_cover_page": true,
             "cover_page": {"id": "c1", "name": "Default", "title": "Agreement"}}
        ]"#;
        let docs: Vec<Document> = serde_json::from_str(json).unwrap();
        assert_eq!(docs[0].kind(), DocumentKind::Invoice);
        assert_eq!(docs[0].totals().total, Money(25100));
        assert_eq!(docs[0].export_file_name(), "Invoice_INV-001.pdf");
        assert!(!docs[0].wants_cover_page());

        assert_eq!(docs[1].kind(), DocumentKind::OrderForm);
        assert_eq!(docs[1].export_file_name(), "OrderForm_OF-002.pdf");
        assert!(docs[1].wants_cover_page());
        assert_eq!(docs[1].cover_page().map(|c| c.title.as_str()), Some("Agreement"));
    }

    #[test]
    fn blank_msa_counts_as_absent() {
        let doc = Document::Invoice(Invoice {
            id: "i1".into(),
            invoice_number: "INV-9".into(),
            customer_id: None,
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            due_date: None,
            status: InvoiceStatus::Draft,
            line_items: vec![],
            discount_percent: 0.0,
            tax_rate_percent: 0.0,
            notes: None,
            attachments: Attachments {
                msa_content: Some("   ".into()),
                include_cover_page: true,
                cover_page: None,
            },
        });
        assert!(doc.msa_content().is_none());
        assert!(!doc.wants_cover_page());
    }

    #[test]
    fn address_lines_skip_empty_parts() {
        let addr = Address {
            line1: "123 Business St".into(),
            line2: None,
            city: "New York".into(),
            state: Some("NY".into()),
            postal_code: "10001".into(),
            country: String::new(),
        };
        assert_eq!(addr.lines(), vec!["123 Business St", "New York, NY 10001"]);
    }
}
