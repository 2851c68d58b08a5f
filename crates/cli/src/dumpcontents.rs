//! dumpcontents - Inspect page content streams
//!
//! Loads one or more decoded content stream files as the `/Contents` array
//! of a single page and prints the parsed operators, the extracted text or
//! text search hits.

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Parser};
use memmap2::Mmap;
use quire_core::content::{ContentParams, ContentStream, OpRef};
use quire_core::document::{CONTENTS, DocumentGraph, MemoryDocument, Page};
use quire_core::interp::{PlainTextBackend, TextSearchParams};
use quire_core::model::{Operand, PDFDict, PDFObject, PDFStream};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// One operator in JSON output.
#[derive(Serialize)]
struct OperatorJson {
    name: String,
    operands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<OperatorJson>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    unknown: bool,
}

/// One content stream in JSON output.
#[derive(Serialize)]
struct StreamJson {
    index: usize,
    backing: Vec<String>,
    operators: Vec<OperatorJson>,
}

fn operand_text(operand: &Operand) -> String {
    let mut out = Vec::new();
    operand.write_to(&mut out);
    String::from_utf8_lossy(&out).into_owned()
}

fn operator_json(op: OpRef<'_>) -> OperatorJson {
    OperatorJson {
        name: op.name().to_string(),
        operands: op.operands().iter().map(operand_text).collect(),
        children: op.children().map(operator_json).collect(),
        unknown: op.op().is_unknown(),
    }
}

fn backing_refs(stream: &ContentStream) -> Vec<String> {
    stream
        .backing_streams()
        .iter()
        .map(|b| b.objref.to_string())
        .collect()
}

fn stream_json(index: usize, stream: &ContentStream) -> StreamJson {
    StreamJson {
        index,
        backing: backing_refs(stream),
        operators: stream.iter().map(operator_json).collect(),
    }
}

/// Print a stream as an indented operator tree.
fn dump_tree<W: Write>(out: &mut W, index: usize, stream: &ContentStream) -> io::Result<()> {
    writeln!(out, "stream {index} [{}]", backing_refs(stream).join(", "))?;
    for op in stream.walk() {
        let indent = "  ".repeat(op.depth() + 1);
        let operands: Vec<String> = op.operands().iter().map(operand_text).collect();
        let marker = if op.op().is_unknown() { " (unknown)" } else { "" };
        if operands.is_empty() {
            writeln!(out, "{indent}{}{marker}", op.name())?;
        } else {
            writeln!(out, "{indent}{} {}{marker}", operands.join(" "), op.name())?;
        }
    }
    Ok(())
}

/// Build a one-page document whose `/Contents` lists `files` in order.
fn load_page(files: &[PathBuf], params: ContentParams) -> Result<(Rc<MemoryDocument>, Page)> {
    let doc = Rc::new(MemoryDocument::new());
    let mut refs = Vec::with_capacity(files.len());
    for path in files {
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("cannot map {}", path.display()))?;
        let stream = PDFStream::from_data(mmap.to_vec());
        let objref = doc.add_indirect(PDFObject::Stream(Box::new(stream)))?;
        debug!(path = %path.display(), %objref, bytes = mmap.len(), "content stream loaded");
        refs.push(PDFObject::Ref(objref));
    }

    let mut dict = PDFDict::new();
    dict.insert("Type".to_string(), PDFObject::Name("Page".to_string()));
    dict.insert(CONTENTS.to_string(), PDFObject::Array(refs));
    let page_ref = doc.add_indirect(PDFObject::Dict(dict))?;
    let node = doc.get_indirect(page_ref)?;

    let graph: Rc<dyn DocumentGraph> = doc.clone();
    let page = Page::with_params(graph, node, params, Rc::new(PlainTextBackend))?;
    Ok((doc, page))
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// A command line tool for inspecting page content streams.
#[derive(Parser, Debug)]
#[command(name = "dumpcontents")]
#[command(author, version, about = "Dump parsed PDF page content streams", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .args(["tree", "json", "text", "find"])
))]
struct Args {
    /// Decoded content stream files, in drawing order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Reject unbalanced BT/ET and BMC/BDC/EMC instead of recovering
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    // === Output modes (mutually exclusive, default: canonical content) ===
    /// Print every content stream as an operator tree
    #[arg(short = 't', long, action = ArgAction::SetTrue)]
    tree: bool,

    /// Print the content streams as JSON
    #[arg(short = 'j', long, action = ArgAction::SetTrue)]
    json: bool,

    /// Print the page text
    #[arg(short = 'x', long, action = ArgAction::SetTrue)]
    text: bool,

    /// Print the bounding box of every match of a string
    #[arg(short = 'f', long, value_name = "NEEDLE")]
    find: Option<String>,

    // === Text options ===
    /// Encoding of string operands (latin1, utf-8)
    #[arg(short = 'e', long)]
    encoding: Option<String>,

    /// Match case when searching
    #[arg(long, action = ArgAction::SetTrue)]
    case_sensitive: bool,

    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let params = if args.strict {
        ContentParams::new().strict()
    } else {
        ContentParams::new()
    };
    let (_doc, page) = load_page(&args.files, params)?;
    if !page.is_valid() {
        page.revalidate().context("content streams do not parse")?;
    }
    let contents = page.contents();
    info!(files = args.files.len(), streams = contents.len(), "page assembled");

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("cannot create {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };

    if let Some(needle) = &args.find {
        let search = TextSearchParams {
            case_sensitive: args.case_sensitive,
        };
        for (x0, y0, x1, y1) in contents.find_text(needle, &search)? {
            writeln!(output, "{x0:.2} {y0:.2} {x1:.2} {y1:.2}")?;
        }
    } else if args.text {
        let text = contents.get_text(args.encoding.as_deref(), None)?;
        writeln!(output, "{text}")?;
    } else if args.json {
        let streams: Vec<StreamJson> = contents
            .streams()
            .iter()
            .enumerate()
            .map(|(index, stream)| stream_json(index, stream))
            .collect();
        serde_json::to_writer_pretty(&mut output, &streams)?;
        writeln!(output)?;
    } else if args.tree {
        for (index, stream) in contents.streams().iter().enumerate() {
            dump_tree(&mut output, index, stream)?;
        }
    } else {
        output.write_all(contents.to_text().as_bytes())?;
    }

    output.flush()?;
    Ok(())
}
