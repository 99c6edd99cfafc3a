//! doc-export – command-line invoice / order-form → PDF exporter.
//!
//! Usage:
//!   doc-export <documents.json> [--out DIR] [--customers FILE] [--branding FILE]
//!              [--combined NAME] [--config FILE] [--font FILE] [--landscape] [--manifest]
//!
//! The documents file holds one document or an array of documents. Without
//! `--combined` every document is exported to its own file.

use std::{env, fs, path::Path, path::PathBuf, process};

use doc_export::fonts::FontManager;
use doc_export::{
    Branding, Customer, DirectorySink, Document, ExportConfig, ExportError, ExportReport, Exporter,
    LogNotifier, PageOrientation, SkiaRasterizer,
};
use serde::Deserialize;

#[derive(Default)]
struct Args {
    documents: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    customers: Option<PathBuf>,
    branding: Option<PathBuf>,
    combined: Option<String>,
    config: Option<PathBuf>,
    font: Option<PathBuf>,
    landscape: bool,
    manifest: bool,
}

/// One document or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

fn main() {
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    let args = parse_args(&argv);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(args)) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn parse_args(argv: &[String]) -> Args {
    let prog = argv.first().map(String::as_str).unwrap_or("doc-export");
    let mut args = Args::default();

    let mut iter = argv.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| match iter.next() {
            Some(v) => v.clone(),
            None => {
                eprintln!("Missing value for {flag}");
                print_usage(prog);
                process::exit(1);
            }
        };
        match arg.as_str() {
            "--out" | "-o" => args.out_dir = Some(PathBuf::from(value(arg))),
            "--customers" | "-c" => args.customers = Some(PathBuf::from(value(arg))),
            "--branding" | "-b" => args.branding = Some(PathBuf::from(value(arg))),
            "--combined" => args.combined = Some(value(arg)),
            "--config" => args.config = Some(PathBuf::from(value(arg))),
            "--font" => args.font = Some(PathBuf::from(value(arg))),
            "--landscape" | "-l" => args.landscape = true,
            "--manifest" => args.manifest = true,
            "--help" | "-h" => {
                print_usage(prog);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(prog);
                process::exit(1);
            }
            path => {
                if args.documents.is_some() {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(prog);
                    process::exit(1);
                }
                args.documents = Some(PathBuf::from(path));
            }
        }
    }

    if args.documents.is_none() {
        eprintln!("Error: no documents file specified.");
        print_usage(prog);
        process::exit(1);
    }
    args
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ExportError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

async fn run(args: Args) -> Result<(), ExportError> {
    let documents_path = args
        .documents
        .ok_or_else(|| ExportError::Configuration("no documents file".to_string()))?;
    let documents: Vec<Document> = read_json::<OneOrMany<Document>>(&documents_path)?.into_vec();
    let customers: Vec<Customer> = match &args.customers {
        Some(path) => read_json::<OneOrMany<Customer>>(path)?.into_vec(),
        None => Vec::new(),
    };
    let branding: Option<Branding> = args.branding.as_deref().map(read_json).transpose()?;

    let mut config = match &args.config {
        Some(path) => ExportConfig::from_file(path)?,
        None => ExportConfig::default(),
    };
    if args.landscape {
        config.orientation = PageOrientation::Landscape;
    }
    config.validate()?;

    let fonts = match &args.font {
        Some(path) => {
            let mut fonts = FontManager::new();
            fonts.load_file(path, false, false)?;
            fonts
        }
        None => FontManager::with_system_fonts(),
    };

    // Customers are matched by id, standing in for the data layer.
    let customer_for = |doc: &Document| -> Option<Customer> {
        let id = doc.customer_id()?;
        let found = customers.iter().find(|c| c.id == id).cloned();
        if found.is_none() {
            log::warn!("{}: customer `{id}` not found", doc.label());
        }
        found
    };

    let out_dir = args.out_dir.unwrap_or_else(|| PathBuf::from("."));
    let sink = DirectorySink::new(&out_dir);
    let mut exporter = Exporter::new(SkiaRasterizer::new(fonts), LogNotifier, sink, config);
    if let Some(branding) = branding {
        exporter = exporter.with_branding(branding);
    }

    let mut reports = Vec::new();
    match &args.combined {
        Some(name) => {
            let aligned: Vec<Option<Customer>> = documents.iter().map(customer_for).collect();
            let file_name = if name.ends_with(".pdf") {
                name.clone()
            } else {
                format!("{name}.pdf")
            };
            reports.push(exporter.export_batch(&documents, &aligned, &file_name).await?);
        }
        None => {
            let mut failures = 0usize;
            for doc in &documents {
                let customer = customer_for(doc);
                match exporter.export_document(doc, customer.as_ref()).await {
                    Ok(report) => reports.push(report),
                    Err(_) => failures += 1,
                }
            }
            if failures > 0 {
                report_all(&reports, exporter.sink(), args.manifest)?;
                return Err(ExportError::render(
                    "export",
                    format!("{failures} of {} document(s) failed", documents.len()),
                ));
            }
        }
    }

    report_all(&reports, exporter.sink(), args.manifest)
}

fn report_all(reports: &[ExportReport], sink: &DirectorySink, manifest: bool) -> Result<(), ExportError> {
    for report in reports {
        // Same name sanitising as the sink applied when it wrote the PDF.
        eprintln!(
            "Wrote '{}' ({} bytes, {} page{})",
            sink.path_for(&report.file_name).display(),
            report.byte_len,
            report.page_count,
            if report.page_count == 1 { "" } else { "s" }
        );
        if manifest {
            let name = format!("{}.json", report.file_name.trim_end_matches(".pdf"));
            let path = sink.path_for(&name);
            fs::write(&path, &report.manifest)?;
            eprintln!("Wrote '{}'", path.display());
        }
    }
    Ok(())
}

fn print_usage(prog: &str) {
    eprintln!("doc-export – invoice and order form PDF exporter");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <documents.json> [--out DIR] [--customers FILE] [--branding FILE]");
    eprintln!("        [--combined NAME] [--config FILE] [--font FILE] [--landscape] [--manifest]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <documents.json>  One document or an array of documents (\"type\": \"invoice\" | \"order_form\")");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --out, -o         Output directory (default: current directory)");
    eprintln!("  --customers, -c   Customers JSON, matched to documents by customer_id");
    eprintln!("  --branding, -b    Company branding JSON (name, address, logo data URI)");
    eprintln!("  --combined        Export all documents into one PDF with this name");
    eprintln!("  --config          Export config JSON (page size, margins, scale, delays)");
    eprintln!("  --font            TTF/OTF file used for all text (default: system sans-serif)");
    eprintln!("  --landscape       Use landscape page orientation");
    eprintln!("  --manifest        Write a JSON page/placement manifest next to each PDF");
    eprintln!("  --help            Print this message");
}
