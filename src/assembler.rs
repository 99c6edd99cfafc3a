//! Document and batch assembly.
//!
//! An [`Exporter`] owns the collaborators of the pipeline (rasterizer,
//! notifier, output sink) and runs one export at a time:
//!
//! 1. create a host container for the operation
//! 2. for every section of every document: render via the bridge, composite
//! 3. finalize the paginated output and hand the bytes to the sink
//!
//! Failures abort the whole operation, produce exactly one error
//! notification and save nothing. The host container is removed on every
//! path because it lives in a guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::bridge::{Rasterizer, RendererBridge};
use crate::compositor;
use crate::config::ExportConfig;
use crate::document::{Branding, Customer, Document, DocumentKind};
use crate::error::{ExportError, Result};
use crate::host::HostEnvironment;
use crate::notify::{NotificationKind, Notifier};
use crate::output::{PaginatedOutput, SectionRecord};
use crate::sink::OutputSink;
use crate::templates::{cover_page_view, main_view, msa_view, ViewContext};
use crate::view::{SectionKind, View};

/// Where an export currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Rendering {
        document_index: usize,
        section: SectionKind,
    },
    Compositing {
        document_index: usize,
        section: SectionKind,
    },
    Finalizing,
    Done,
    Failed,
}

/// Summary of a saved export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub file_name: String,
    pub page_count: usize,
    pub byte_len: usize,
    pub sections: Vec<SectionRecord>,
    /// Page and placement layout of the saved file as pretty JSON.
    #[serde(skip)]
    pub manifest: String,
}

/// Sections rendered for a document, in order: cover page (only in front of
/// an MSA, and only when requested), MSA (when present), main content.
pub fn section_plan(document: &Document) -> Vec<SectionKind> {
    let mut plan = Vec::with_capacity(3);
    if document.wants_cover_page() {
        plan.push(SectionKind::CoverPage);
    }
    if document.msa_content().is_some() {
        plan.push(SectionKind::Msa);
    }
    plan.push(match document.kind() {
        DocumentKind::Invoice => SectionKind::Invoice,
        DocumentKind::OrderForm => SectionKind::OrderForm,
    });
    plan
}

fn section_view(section: SectionKind, ctx: &ViewContext<'_>) -> View {
    match section {
        SectionKind::CoverPage => cover_page_view(ctx),
        SectionKind::Msa => msa_view(ctx),
        SectionKind::Invoice | SectionKind::OrderForm => main_view(ctx),
    }
}

pub struct Exporter<R, N, S> {
    bridge: RendererBridge<R>,
    notifier: N,
    sink: S,
    config: ExportConfig,
    branding: Option<Branding>,
    state: Mutex<ExportState>,
    busy: AtomicBool,
}

/// Clears the busy flag when an operation ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: Rasterizer, N: Notifier, S: OutputSink> Exporter<R, N, S> {
    pub fn new(rasterizer: R, notifier: N, sink: S, config: ExportConfig) -> Self {
        Self::with_hosts(rasterizer, notifier, sink, config, HostEnvironment::new())
    }

    /// Use an existing host environment (lets callers observe containers).
    pub fn with_hosts(
        rasterizer: R,
        notifier: N,
        sink: S,
        config: ExportConfig,
        hosts: Arc<HostEnvironment>,
    ) -> Self {
        let bridge = RendererBridge::new(rasterizer, hosts, config.scale, config.settle_delay());
        Self {
            bridge,
            notifier,
            sink,
            config,
            branding: None,
            state: Mutex::new(ExportState::Idle),
            busy: AtomicBool::new(false),
        }
    }

    pub fn with_branding(mut self, branding: Branding) -> Self {
        self.branding = Some(branding);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn hosts(&self) -> &Arc<HostEnvironment> {
        self.bridge.hosts()
    }

    pub fn rasterizer(&self) -> &R {
        self.bridge.rasterizer()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn set_state(&self, state: ExportState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn begin(&self) -> Result<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Export requested while another export is running");
            return Err(ExportError::Busy);
        }
        self.set_state(ExportState::Idle);
        Ok(BusyGuard(&self.busy))
    }

    /// Export one document as `Invoice_<number>.pdf` / `OrderForm_<number>.pdf`.
    pub async fn export_document(&self, document: &Document, customer: Option<&Customer>) -> Result<ExportReport> {
        let _busy = self.begin()?;
        let label = document.label();
        log::info!("Exporting {label}");

        let result = self
            .run_document(document, customer)
            .await
            .map_err(|e| e.for_document(label.as_str()));
        self.finish(result, |e| format!("Failed to export {e}"))
    }

    /// Export several documents into one PDF named `file_name`.
    ///
    /// `customers` is index-aligned with `documents`.
    pub async fn export_batch(
        &self,
        documents: &[Document],
        customers: &[Option<Customer>],
        file_name: &str,
    ) -> Result<ExportReport> {
        let _busy = self.begin()?;
        log::info!("Exporting {} documents into {file_name}", documents.len());

        let result = self.run_batch(documents, customers, file_name).await;
        self.finish(result, |e| {
            format!("Combined export failed: {e}. Try downloading the documents individually.")
        })
    }

    async fn run_document(&self, document: &Document, customer: Option<&Customer>) -> Result<ExportReport> {
        let file_name = document.export_file_name();
        let host = self.hosts().create_container(self.config.host_width);
        let mut output = PaginatedOutput::new(self.title_for(&file_name), self.config.geometry());

        let mut is_first = true;
        self.render_document(&mut output, host.id(), 0, document, customer, &mut is_first)
            .await?;
        self.save(output, &file_name)
    }

    async fn run_batch(
        &self,
        documents: &[Document],
        customers: &[Option<Customer>],
        file_name: &str,
    ) -> Result<ExportReport> {
        if documents.is_empty() {
            return Err(ExportError::EmptyBatch);
        }
        if documents.len() != customers.len() {
            return Err(ExportError::BatchMismatch {
                documents: documents.len(),
                customers: customers.len(),
            });
        }

        let host = self.hosts().create_container(self.config.host_width);
        let mut output = PaginatedOutput::new(self.title_for(file_name), self.config.geometry());
        let total = documents.len();
        let throttle = self.config.throttle_delay();

        let mut is_first = true;
        for (index, (document, customer)) in documents.iter().zip(customers).enumerate() {
            self.render_document(&mut output, host.id(), index, document, customer.as_ref(), &mut is_first)
                .await
                .map_err(|e| e.for_document(document.label()))?;

            self.notifier.notify(
                &format!("Processed {} of {total} documents", index + 1),
                NotificationKind::Info,
            );
            if index + 1 < total && !throttle.is_zero() {
                tokio::time::sleep(throttle).await;
            }
        }

        self.save(output, file_name)
    }

    /// Render and composite every section of one document.
    async fn render_document(
        &self,
        output: &mut PaginatedOutput,
        host_id: &str,
        document_index: usize,
        document: &Document,
        customer: Option<&Customer>,
        is_first: &mut bool,
    ) -> Result<()> {
        let ctx = ViewContext::new(document, customer, self.branding.as_ref());

        for section in section_plan(document) {
            self.set_state(ExportState::Rendering {
                document_index,
                section,
            });
            let view = section_view(section, &ctx);
            let surface = self.bridge.render(&view, host_id).await?;

            self.set_state(ExportState::Compositing {
                document_index,
                section,
            });
            if compositor::composite(output, surface, *is_first, document_index, section)? {
                *is_first = false;
            }
        }
        Ok(())
    }

    fn save(&self, output: PaginatedOutput, file_name: &str) -> Result<ExportReport> {
        self.set_state(ExportState::Finalizing);
        let page_count = output.page_count();
        let sections = output.sections().to_vec();
        let manifest = output.manifest_json()?;
        let bytes = output.finalize()?;
        self.sink.save(file_name, &bytes)?;

        Ok(ExportReport {
            file_name: file_name.to_string(),
            page_count,
            byte_len: bytes.len(),
            sections,
            manifest,
        })
    }

    fn title_for(&self, file_name: &str) -> String {
        self.config
            .title
            .clone()
            .unwrap_or_else(|| file_name.trim_end_matches(".pdf").to_string())
    }

    fn finish(&self, result: Result<ExportReport>, failure_message: impl FnOnce(&ExportError) -> String) -> Result<ExportReport> {
        match result {
            Ok(report) => {
                self.set_state(ExportState::Done);
                log::info!(
                    "Saved {} ({} bytes, {} page{})",
                    report.file_name,
                    report.byte_len,
                    report.page_count,
                    if report.page_count == 1 { "" } else { "s" }
                );
                self.notifier.notify(
                    &format!("Downloaded {}", report.file_name),
                    NotificationKind::Success,
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(ExportState::Failed);
                log::error!("{e}");
                self.notifier.notify(&failure_message(&e), NotificationKind::Error);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Attachments, Invoice, InvoiceStatus};
    use chrono::NaiveDate;

    fn invoice(msa: Option<&str>, include_cover_page: bool) -> Document {
        Document::Invoice(Invoice {
            id: "i1".into(),
            invoice_number: "INV-001".into(),
            customer_id: None,
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            due_date: None,
            status: InvoiceStatus::Draft,
            line_items: vec![],
            discount_percent: 0.0,
            tax_rate_percent: 0.0,
            notes: None,
            attachments: Attachments {
                msa_content: msa.map(str::to_string),
                include_cover_page,
                cover_page: None,
            },
        })
    }

    #[test]
    fn plan_without_msa_is_main_only() {
        assert_eq!(section_plan(&invoice(None, true)), vec![SectionKind::Invoice]);
    }

    #[test]
    fn plan_with_msa_and_cover() {
        assert_eq!(
            section_plan(&invoice(Some("<p>Terms</p>"), true)),
            vec![SectionKind::CoverPage, SectionKind::Msa, SectionKind::Invoice]
        );
        assert_eq!(
            section_plan(&invoice(Some("<p>Terms</p>"), false)),
            vec![SectionKind::Msa, SectionKind::Invoice]
        );
    }
}
