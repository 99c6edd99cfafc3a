//! Presentational views for exported documents.
//!
//! Each builder turns borrowed document data into a [`View`]: the cover page,
//! the MSA body, and the invoice or order-form layout. Builders are pure and
//! deterministic; the same inputs always produce the same view tree.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::document::{
    Branding, CoverPageTemplate, Customer, Document, Invoice, LineItem, Money, OrderForm, Totals,
};
use crate::richtext;
use crate::view::{Block, BoxStyle, Color, SectionKind, TableColumn, TextAlign, TextStyle, View};

/// Outer padding of every view, in CSS px.
const PAGE_PADDING: f32 = 48.0;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("BUG: invalid PLACEHOLDER_RE regex literal")
});

/// Everything a view may show, borrowed for the duration of one render.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    pub document: &'a Document,
    pub customer: Option<&'a Customer>,
    pub branding: Option<&'a Branding>,
}

impl<'a> ViewContext<'a> {
    pub fn new(document: &'a Document, customer: Option<&'a Customer>, branding: Option<&'a Branding>) -> Self {
        Self {
            document,
            customer,
            branding,
        }
    }

    fn currency(&self) -> &str {
        self.customer.map(|c| c.currency.as_str()).unwrap_or("USD")
    }

    fn money(&self, amount: Money) -> String {
        amount.format(self.currency())
    }

    fn accent(&self) -> Color {
        self.branding
            .and_then(|b| b.accent_color.as_deref())
            .and_then(Color::from_hex)
            .unwrap_or(Color::NAVY)
    }

    fn company_name(&self) -> &str {
        self.branding.map(|b| b.company_name.as_str()).unwrap_or("")
    }

    fn customer_name(&self) -> &str {
        self.customer.map(|c| c.name.as_str()).unwrap_or("Customer")
    }

    fn placeholder(&self, key: &str) -> Option<String> {
        let doc = self.document;
        let value = match key {
            "customer_name" => self.customer_name().to_string(),
            "customer_email" => self.customer.and_then(|c| c.email.clone()).unwrap_or_default(),
            "customer_address" => self.customer.map(|c| c.billing_address.to_string()).unwrap_or_default(),
            "company_name" => self.company_name().to_string(),
            "company_email" => self.branding.and_then(|b| b.email.clone()).unwrap_or_default(),
            "company_address" => self.branding.map(|b| b.address.to_string()).unwrap_or_default(),
            "document_type" => doc.kind().title().to_string(),
            "document_number" => doc.number().to_string(),
            "issue_date" | "date" => format_date(doc.issue_date()),
            "total" => self.money(doc.totals().total),
            _ => return None,
        };
        Some(value)
    }
}

/// Replace `{{key}}` placeholders with document values.
///
/// Unknown keys are left untouched so that a typo shows up in the export
/// instead of silently disappearing.
pub fn fill_placeholders(text: &str, ctx: &ViewContext<'_>) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures<'_>| {
            ctx.placeholder(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn format_date(date: chrono::NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        let s = format!("{quantity:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn format_percent(percent: f64) -> String {
    format_quantity(percent)
}

fn page(children: Vec<Block>) -> Block {
    Block::styled_column(
        BoxStyle {
            padding: PAGE_PADDING,
            gap: 0.0,
            background: Some(Color::WHITE),
            ..BoxStyle::default()
        },
        children,
    )
}

fn section(margin_bottom: f32, children: Vec<Block>) -> Block {
    Block::styled_column(
        BoxStyle {
            margin_bottom,
            ..BoxStyle::default()
        },
        children,
    )
}

fn muted() -> TextStyle {
    TextStyle::default().size(12.0).color(Color::GRAY_500)
}

fn label() -> TextStyle {
    TextStyle::default().size(11.0).bold().color(Color::GRAY_500)
}

// ---------------------------------------------------------------------------
// Cover page
// ---------------------------------------------------------------------------

/// The cover page rendered in front of an MSA.
///
/// Falls back to a generated cover when the document links no template.
pub fn cover_page_view(ctx: &ViewContext<'_>) -> View {
    let fallback;
    let template = match ctx.document.cover_page() {
        Some(t) => t,
        None => {
            fallback = default_cover_template(ctx);
            &fallback
        }
    };

    let band_color = template
        .background_color
        .as_deref()
        .and_then(Color::from_hex)
        .unwrap_or_else(|| ctx.accent());

    let mut band = Vec::new();
    if template.show_logo {
        if let Some(logo) = ctx.branding.and_then(|b| b.logo.clone()) {
            band.push(Block::Image {
                src: logo,
                width: 160.0,
                height: 64.0,
            });
            band.push(Block::spacer(32.0));
        }
    }
    band.push(Block::text(
        fill_placeholders(&template.title, ctx),
        TextStyle::default().size(36.0).bold().color(Color::WHITE).line_height(1.2),
    ));
    if let Some(subtitle) = template.subtitle.as_deref().filter(|s| !s.trim().is_empty()) {
        band.push(Block::spacer(12.0));
        band.push(Block::text(
            fill_placeholders(subtitle, ctx),
            TextStyle::default().size(18.0).color(Color::WHITE),
        ));
    }

    let mut body = Vec::new();
    if let Some(text) = template.body.as_deref().filter(|s| !s.trim().is_empty()) {
        body.extend(richtext::to_blocks(
            &fill_placeholders(text, ctx),
            &TextStyle::default().size(15.0),
        ));
        body.push(Block::spacer(24.0));
    }
    body.push(detail_line("Prepared for", ctx.customer_name()));
    if !ctx.company_name().is_empty() {
        body.push(detail_line("Prepared by", ctx.company_name()));
    }
    body.push(detail_line(
        "Reference",
        &format!("{} {}", ctx.document.kind().title(), ctx.document.number()),
    ));
    body.push(detail_line("Date", &format_date(ctx.document.issue_date())));

    let root = Block::styled_column(
        BoxStyle {
            background: Some(Color::WHITE),
            ..BoxStyle::default()
        },
        vec![
            Block::styled_column(
                BoxStyle {
                    padding: PAGE_PADDING,
                    background: Some(band_color),
                    min_height: Some(420.0),
                    ..BoxStyle::default()
                },
                band,
            ),
            Block::styled_column(
                BoxStyle {
                    padding: PAGE_PADDING,
                    ..BoxStyle::default()
                },
                body,
            ),
        ],
    );
    View::new(SectionKind::CoverPage, root)
}

fn default_cover_template(ctx: &ViewContext<'_>) -> CoverPageTemplate {
    CoverPageTemplate {
        id: String::new(),
        name: "Default".to_string(),
        title: "{{document_type}} {{document_number}}".to_string(),
        subtitle: Some("Prepared for {{customer_name}}".to_string()),
        body: None,
        show_logo: ctx.branding.is_some_and(|b| b.logo.is_some()),
        background_color: None,
    }
}

fn detail_line(name: &str, value: &str) -> Block {
    Block::Row {
        style: BoxStyle {
            margin_bottom: 6.0,
            ..BoxStyle::default()
        },
        children: vec![
            (1.0, Block::text(name.to_uppercase(), label())),
            (3.0, Block::text(value, TextStyle::default())),
        ],
    }
}

// ---------------------------------------------------------------------------
// MSA
// ---------------------------------------------------------------------------

/// The Master Service Agreement body. Empty when the document has none.
pub fn msa_view(ctx: &ViewContext<'_>) -> View {
    let mut children = vec![
        Block::text(
            "Master Service Agreement",
            TextStyle::default().size(24.0).bold().color(ctx.accent()),
        ),
        Block::spacer(4.0),
        Block::text(
            format!(
                "{} {} · {}",
                ctx.document.kind().title(),
                ctx.document.number(),
                ctx.customer_name()
            ),
            muted(),
        ),
        Block::spacer(16.0),
        Block::rule(),
        Block::spacer(16.0),
    ];
    if let Some(content) = ctx.document.msa_content() {
        children.extend(richtext::to_blocks(
            &fill_placeholders(content, ctx),
            &TextStyle::default(),
        ));
    }
    View::new(SectionKind::Msa, page(children))
}

// ---------------------------------------------------------------------------
// Main content
// ---------------------------------------------------------------------------

/// The main content view for the document's variant.
pub fn main_view(ctx: &ViewContext<'_>) -> View {
    match ctx.document {
        Document::Invoice(invoice) => invoice_view(ctx, invoice),
        Document::OrderForm(order) => order_form_view(ctx, order),
    }
}

pub fn invoice_view(ctx: &ViewContext<'_>, invoice: &Invoice) -> View {
    let mut details = vec![("Issue date", format_date(invoice.issue_date))];
    if let Some(due) = invoice.due_date {
        details.push(("Due date", format_date(due)));
    }
    details.push(("Status", invoice.status.to_string()));

    let mut children = vec![
        header(ctx, "INVOICE", &invoice.invoice_number),
        Block::rule(),
        Block::spacer(24.0),
        parties(ctx, "Bill to", &details),
        line_items_table(ctx, &invoice.line_items),
        totals_block(ctx, &ctx.document.totals(), invoice.discount_percent, invoice.tax_rate_percent),
    ];
    children.extend(notes_block(invoice.notes.as_deref()));
    View::new(SectionKind::Invoice, page(children))
}

pub fn order_form_view(ctx: &ViewContext<'_>, order: &OrderForm) -> View {
    let mut details = vec![("Issue date", format_date(order.issue_date))];
    if let Some(valid) = order.valid_until {
        details.push(("Valid until", format_date(valid)));
    }
    if let Some(term) = order.term_months {
        let unit = if term == 1 { "month" } else { "months" };
        details.push(("Term", format!("{term} {unit}")));
    }

    let mut children = vec![
        header(ctx, "ORDER FORM", &order.order_form_number),
        Block::rule(),
        Block::spacer(24.0),
        parties(ctx, "Prepared for", &details),
        line_items_table(ctx, &order.line_items),
        totals_block(ctx, &ctx.document.totals(), order.discount_percent, order.tax_rate_percent),
    ];
    children.extend(notes_block(order.notes.as_deref()));
    children.push(signature_block(ctx));
    View::new(SectionKind::OrderForm, page(children))
}

fn header(ctx: &ViewContext<'_>, title: &str, number: &str) -> Block {
    let mut company = Vec::new();
    if let Some(branding) = ctx.branding {
        if let Some(logo) = &branding.logo {
            company.push(Block::Image {
                src: logo.clone(),
                width: 120.0,
                height: 48.0,
            });
            company.push(Block::spacer(8.0));
        }
        company.push(Block::text(
            branding.company_name.clone(),
            TextStyle::default().size(20.0).bold().color(ctx.accent()),
        ));
        for line in branding.address.lines() {
            company.push(Block::text(line, muted()));
        }
        if let Some(email) = &branding.email {
            company.push(Block::text(email.clone(), muted()));
        }
    }

    let heading = vec![
        Block::text(
            title,
            TextStyle::default()
                .size(28.0)
                .bold()
                .color(ctx.accent())
                .align(TextAlign::Right),
        ),
        Block::text(
            format!("# {number}"),
            TextStyle::default().size(14.0).color(Color::GRAY_500).align(TextAlign::Right),
        ),
    ];

    Block::Row {
        style: BoxStyle {
            margin_bottom: 24.0,
            ..BoxStyle::default()
        },
        children: vec![(1.0, Block::column(company)), (1.0, Block::column(heading))],
    }
}

fn parties(ctx: &ViewContext<'_>, recipient_label: &str, details: &[(&str, String)]) -> Block {
    let mut recipient = vec![
        Block::text(recipient_label.to_uppercase(), label()),
        Block::spacer(4.0),
    ];
    match ctx.customer {
        Some(customer) => {
            recipient.push(Block::text(customer.name.clone(), TextStyle::default().bold()));
            for line in customer.billing_address.lines() {
                recipient.push(Block::text(line, muted()));
            }
            if let Some(email) = &customer.email {
                recipient.push(Block::text(email.clone(), muted()));
            }
        }
        None => recipient.push(Block::text("Unknown customer", muted().italic())),
    }

    let facts = details
        .iter()
        .map(|(name, value)| {
            (
                1.0,
                Block::column(vec![
                    Block::text(name.to_uppercase(), label()),
                    Block::text(value.clone(), TextStyle::default()),
                ]),
            )
        })
        .collect::<Vec<_>>();

    Block::Row {
        style: BoxStyle {
            margin_bottom: 32.0,
            gap: 24.0,
            ..BoxStyle::default()
        },
        children: vec![
            (1.0, Block::column(recipient)),
            (
                1.0,
                Block::Row {
                    style: BoxStyle {
                        gap: 12.0,
                        ..BoxStyle::default()
                    },
                    children: facts,
                },
            ),
        ],
    }
}

fn line_items_table(ctx: &ViewContext<'_>, items: &[LineItem]) -> Block {
    let columns = vec![
        TableColumn::new("Description", 5.0, TextAlign::Left),
        TableColumn::new("Qty", 1.0, TextAlign::Right),
        TableColumn::new("Unit price", 2.0, TextAlign::Right),
        TableColumn::new("Amount", 2.0, TextAlign::Right),
    ];
    let rows = items
        .iter()
        .map(|item| {
            vec![
                item.description.clone(),
                format_quantity(item.quantity),
                ctx.money(item.unit_price),
                ctx.money(item.amount()),
            ]
        })
        .collect();

    section(
        24.0,
        vec![Block::Table {
            columns,
            rows,
            header_background: Color::GRAY_100,
            style: TextStyle::default().size(13.0),
        }],
    )
}

fn totals_block(ctx: &ViewContext<'_>, totals: &Totals, discount_percent: f64, tax_rate_percent: f64) -> Block {
    let amount_row = |name: String, value: String, style: TextStyle| {
        Block::Row {
            style: BoxStyle {
                margin_bottom: 4.0,
                ..BoxStyle::default()
            },
            children: vec![
                (1.0, Block::text(name, style.clone())),
                (1.0, Block::text(value, style.align(TextAlign::Right))),
            ],
        }
    };

    let mut rows = vec![amount_row(
        "Subtotal".to_string(),
        ctx.money(totals.subtotal),
        TextStyle::default(),
    )];
    if totals.discount != Money::ZERO {
        rows.push(amount_row(
            format!("Discount ({}%)", format_percent(discount_percent)),
            format!("-{}", ctx.money(totals.discount)),
            TextStyle::default(),
        ));
    }
    if totals.tax != Money::ZERO {
        rows.push(amount_row(
            format!("Tax ({}%)", format_percent(tax_rate_percent)),
            ctx.money(totals.tax),
            TextStyle::default(),
        ));
    }
    rows.push(Block::rule());
    rows.push(Block::spacer(4.0));
    rows.push(amount_row(
        "Total".to_string(),
        ctx.money(totals.total),
        TextStyle::default().size(16.0).bold(),
    ));

    Block::Row {
        style: BoxStyle {
            margin_bottom: 32.0,
            ..BoxStyle::default()
        },
        children: vec![(3.0, Block::spacer(0.0)), (2.0, Block::column(rows))],
    }
}

fn notes_block(notes: Option<&str>) -> Option<Block> {
    let notes = notes.map(str::trim).filter(|n| !n.is_empty())?;
    Some(section(
        24.0,
        vec![
            Block::text("NOTES", label()),
            Block::spacer(4.0),
            Block::text(notes, TextStyle::default().size(13.0).color(Color::GRAY_500)),
        ],
    ))
}

fn signature_block(ctx: &ViewContext<'_>) -> Block {
    let signer = |party: &str, name: &str| {
        Block::column(vec![
            Block::text(party.to_uppercase(), label()),
            Block::spacer(40.0),
            Block::Rule {
                thickness: 1.0,
                color: Color::GRAY_900,
            },
            Block::spacer(4.0),
            Block::text(name, muted()),
            Block::text("Signature / Date", muted()),
        ])
    };
    let company = if ctx.company_name().is_empty() {
        "Provider"
    } else {
        ctx.company_name()
    };
    Block::Row {
        style: BoxStyle {
            gap: 48.0,
            ..BoxStyle::default()
        },
        children: vec![
            (1.0, signer("Accepted by", ctx.customer_name())),
            (1.0, signer("Issued by", company)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Address, Attachments, InvoiceStatus};
    use chrono::NaiveDate;

    fn customer() -> Customer {
        Customer {
            id: "c1".into(),
            name: "Client Inc".into(),
            email: Some("billing@client.example".into()),
            billing_address: Address {
                line1: "456 Client Ave".into(),
                city: "Los Angeles".into(),
                state: Some("CA".into()),
                postal_code: "90001".into(),
                ..Address::default()
            },
            shipping_address: None,
            currency: "USD".into(),
        }
    }

    fn branding() -> Branding {
        Branding {
            company_name: "Acme Corp".into(),
            address: Address::default(),
            email: None,
            logo: None,
            accent_color: Some("#1a365d".into()),
        }
    }

    fn order_form(msa: Option<&str>, cover: Option<CoverPageTemplate>) -> Document {
        Document::OrderForm(OrderForm {
            id: "o1".into(),
            order_form_number: "OF-002".into(),
            customer_id: Some("c1".into()),
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            valid_until: None,
            term_months: Some(12),
            line_items: vec![LineItem {
                description: "Platform subscription".into(),
                quantity: 12.0,
                unit_price: Money::from_major(750.0),
            }],
            discount_percent: 0.0,
            tax_rate_percent: 0.0,
            notes: None,
            attachments: Attachments {
                msa_content: msa.map(str::to_string),
                include_cover_page: true,
                cover_page: cover,
            },
        })
    }

    #[test]
    fn placeholders_are_filled_and_unknown_kept() {
        let doc = order_form(None, None);
        let cust = customer();
        let brand = branding();
        let ctx = ViewContext::new(&doc, Some(&cust), Some(&brand));
        assert_eq!(
            fill_placeholders("{{ customer_name }} x {{company_name}} ({{document_number}}) {{nope}}", &ctx),
            "Client Inc x Acme Corp (OF-002) {{nope}}"
        );
        assert_eq!(fill_placeholders("{{date}}", &ctx), "March 4, 2025");
        assert_eq!(fill_placeholders("{{total}}", &ctx), "$9,000.00");
    }

    #[test]
    fn cover_page_uses_linked_template() {
        let template = CoverPageTemplate {
            id: "t1".into(),
            name: "Enterprise".into(),
            title: "Agreement for {{customer_name}}".into(),
            subtitle: None,
            body: Some("Thank you for choosing {{company_name}}.".into()),
            show_logo: true,
            background_color: Some("#000000".into()),
        };
        let doc = order_form(Some("<p>Terms</p>"), Some(template));
        let cust = customer();
        let brand = branding();
        let view = cover_page_view(&ViewContext::new(&doc, Some(&cust), Some(&brand)));
        assert_eq!(view.section, SectionKind::CoverPage);
        let text = view.root.plain_text();
        assert!(text.contains("Agreement for Client Inc"));
        assert!(text.contains("Thank you for choosing Acme Corp."));
    }

    #[test]
    fn cover_page_without_template_is_generated() {
        let doc = order_form(Some("<p>Terms</p>"), None);
        let view = cover_page_view(&ViewContext::new(&doc, None, None));
        let text = view.root.plain_text();
        assert!(text.contains("Order Form OF-002"));
        assert!(text.contains("Prepared for Customer"));
    }

    #[test]
    fn msa_view_renders_rich_text() {
        let doc = order_form(Some("<h2>Scope</h2><p>{{customer_name}} agrees.</p>"), None);
        let cust = customer();
        let view = msa_view(&ViewContext::new(&doc, Some(&cust), None));
        assert_eq!(view.section, SectionKind::Msa);
        let text = view.root.plain_text();
        assert!(text.contains("Scope"));
        assert!(text.contains("Client Inc agrees."));
    }

    #[test]
    fn main_view_dispatches_by_variant() {
        let invoice = Document::Invoice(Invoice {
            id: "i1".into(),
            invoice_number: "INV-001".into(),
            customer_id: None,
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            due_date: Some(NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()),
            status: InvoiceStatus::Sent,
            line_items: vec![LineItem {
                description: "Web Development".into(),
                quantity: 40.0,
                unit_price: Money::from_major(150.0),
            }],
            discount_percent: 10.0,
            tax_rate_percent: 0.0,
            notes: Some("Net 30".into()),
            attachments: Attachments::default(),
        });
        let view = main_view(&ViewContext::new(&invoice, None, None));
        assert_eq!(view.section, SectionKind::Invoice);
        let text = view.root.plain_text();
        assert!(text.contains("INVOICE"));
        assert!(text.contains("$6,000.00"));
        assert!(text.contains("Discount (10%)"));
        assert!(text.contains("$5,400.00"));
        assert!(text.contains("Net 30"));

        let order = order_form(None, None);
        let view = main_view(&ViewContext::new(&order, None, None));
        assert_eq!(view.section, SectionKind::OrderForm);
        assert!(view.root.plain_text().contains("12 months"));
    }

    #[test]
    fn quantity_formatting() {
        assert_eq!(format_quantity(40.0), "40");
        assert_eq!(format_quantity(1.5), "1.5");
        assert_eq!(format_quantity(0.25), "0.25");
    }
}
