use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use trecrank_core::corpus::CorpusParser;
use trecrank_core::persist::{load_index, save_index, IndexPaths};
use trecrank_core::{Analyzer, AnalyzerConfig, AnalyzerKind, DocumentSink, InvertedIndex, LengthNorm, Schema, Term};
use walkdir::WalkDir;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect a TF-IDF index over TREC text collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a TREC text file or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Length normalization: classic, linear or constant
        #[arg(long, default_value = "classic")]
        norm: LengthNorm,
        /// Analyzer: standard, simple, stop or keyword
        #[arg(long, default_value = "standard")]
        analyzer: AnalyzerKind,
        /// Disable English stemming
        #[arg(long, default_value_t = false)]
        no_stem: bool,
    },
    /// Print corpus statistics for a built index
    Stats {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long, default_value = "TEXT")]
        field: String,
        /// Term to report document and total frequency for
        #[arg(long, default_value = "new")]
        term: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, norm, analyzer, no_stem } => {
            build_index(&input, &output, norm, Analyzer::new(AnalyzerConfig::new(analyzer, !no_stem)))
        }
        Commands::Stats { index, field, term } => print_stats(&index, &field, &term),
    }
}

fn corpus_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            if entry.path().is_file() {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn build_index(input: &str, output: &str, norm: LengthNorm, analyzer: Analyzer) -> Result<()> {
    let start = Instant::now();
    let schema = Schema::trec();
    let parser = CorpusParser::new(&schema);
    let mut index = InvertedIndex::new(schema, norm, analyzer);

    let mut skipped = 0usize;
    for file in corpus_files(Path::new(input)) {
        let reader = match File::open(&file) {
            Ok(f) => BufReader::new(f),
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "cannot open corpus file");
                continue;
            }
        };
        let (docs, bad) = parser.parse_lossy(reader);
        skipped += bad;
        tracing::debug!(file = %file.display(), docs = docs.len(), skipped = bad, "parsed corpus file");
        for fields in docs {
            if let Err(e) = index.add_document(fields) {
                skipped += 1;
                tracing::warn!(file = %file.display(), error = %e, "document rejected by index");
            }
        }
    }

    tracing::info!(
        num_docs = index.num_docs(),
        num_terms = index.dictionary.len(),
        skipped,
        analyzer = ?index.analyzer().config().kind,
        "ingested documents"
    );

    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    save_index(&IndexPaths::new(output), &index, &created_at)?;

    tracing::info!(output, took_s = start.elapsed().as_secs_f64(), "index build complete");
    Ok(())
}

fn print_stats(dir: &str, field: &str, term: &str) -> Result<()> {
    let index = load_index(&IndexPaths::new(dir))?;
    match index.schema.get(field) {
        Some(spec) if spec.indexed => {}
        Some(_) => anyhow::bail!("field {field} is stored but not indexed"),
        None => anyhow::bail!("field {field} is not in the index schema"),
    }
    let term = Term::new(field, index.analyzer().tokens(term).into_iter().next().unwrap_or_default());

    println!("Analyzer: {:?} (stemming {})", index.analyzer().config().kind, index.analyzer().config().stem);
    println!("Total number of documents in the corpus: {}", index.num_docs());
    println!("Number of documents containing the term \"{}\" for field \"{field}\": {}", term.text, index.term_postings(&term).len());
    println!("Number of occurrences of \"{}\" in the field \"{field}\": {}", term.text, index.total_term_freq(&term));
    println!("Size of the vocabulary for this field: {}", index.vocabulary_size(field));
    println!("Number of documents that have at least one term for this field: {}", index.docs_with_field(field));
    println!("Number of tokens for this field: {}", index.sum_total_term_freq(field));
    println!("Number of postings for this field: {}", index.sum_doc_freq(field));
    Ok(())
}
