use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};
use trecrank_core::persist::DiskIndex;
use trecrank_core::run::RunWriter;
use trecrank_core::topics::{parse_topics, QueryKind, Topic};
use trecrank_core::{search, SearchConfig, Similarity};

#[derive(Parser)]
#[command(name = "searcher")]
#[command(about = "Rank documents of a built index by TF-IDF, BM25 or smoothed language models", long_about = None)]
struct Cli {
    /// Index directory path
    #[arg(long, global = true, default_value = "./index")]
    index: String,
    /// JSON file with a search config; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Field to score
    #[arg(long, global = true)]
    field: Option<String>,
    /// Score candidates in this many parallel partitions
    #[arg(long, global = true)]
    partitions: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ad hoc query and print DOCNO and score per hit
    Query {
        #[arg(long)]
        q: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// tfidf, bm25, lmds or lmjms; defaults to the config's similarity
        #[arg(long)]
        similarity: Option<Similarity>,
    },
    /// Run every topic of a TREC topics file and write short and long run files
    Topics {
        #[arg(long)]
        topics: String,
        /// Output directory; each similarity writes <LABEL>_short.run and <LABEL>_long.run
        #[arg(long, default_value = "./runs")]
        output: String,
        #[arg(long, default_value_t = 1000)]
        k: usize,
        /// Comma-separated similarities to run, e.g. bm25,tfidf,lmds,lmjms
        #[arg(long, value_delimiter = ',')]
        similarity: Vec<Similarity>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SearchConfig::from_json_file(path).with_context(|| format!("reading {}", path.display()))?,
        None => SearchConfig::default(),
    };
    if let Some(field) = cli.field {
        config.field = field;
    }
    if let Some(p) = cli.partitions {
        config.partitions = p;
    }

    let index = DiskIndex::open(&cli.index).with_context(|| format!("opening index {}", cli.index))?;
    match cli.command {
        Commands::Query { q, k, similarity } => {
            let similarity = similarity.unwrap_or(config.similarity);
            run_query(&index, &q, config.with_k(k).with_similarity(similarity))
        }
        Commands::Topics { topics, output, k, similarity } => {
            let similarities = if similarity.is_empty() { vec![config.similarity] } else { similarity };
            run_topics(&index, &topics, &output, &similarities, &config.with_k(k))
        }
    }
}

fn docno(index: &DiskIndex, doc_id: u32) -> String {
    index.stored_field(doc_id, "DOCNO").map(str::to_string).unwrap_or_else(|| doc_id.to_string())
}

fn run_query(index: &DiskIndex, q: &str, config: SearchConfig) -> Result<()> {
    let ranking = search(q, &index.analyzer(), index, &config)?;
    println!("{} matching documents", ranking.total_hits);
    for (rank, hit) in ranking.hits.iter().enumerate() {
        println!("{}\t{}\t{}", rank + 1, docno(index, hit.doc_id), hit.score);
    }
    Ok(())
}

fn run_topics(index: &DiskIndex, topics_path: &str, output: &str, similarities: &[Similarity], config: &SearchConfig) -> Result<()> {
    let configs: Vec<SearchConfig> = similarities.iter().map(|&s| config.clone().with_similarity(s)).collect();
    for config in &configs {
        config.validate()?;
    }
    let file = File::open(topics_path).with_context(|| format!("opening topics {topics_path}"))?;
    let topics = parse_topics(BufReader::new(file));
    tracing::info!(topics = topics.len(), "loaded topics");
    fs::create_dir_all(output)?;

    for config in &configs {
        for kind in [QueryKind::Short, QueryKind::Long] {
            write_run(index, &topics, kind, config, Path::new(output))?;
        }
    }
    Ok(())
}

fn write_run(index: &DiskIndex, topics: &[Topic], kind: QueryKind, config: &SearchConfig, output: &Path) -> Result<()> {
    let run = kind.run_id(config.similarity.label());
    let path = output.join(format!("{run}.run"));
    let mut writer = RunWriter::new(BufWriter::new(File::create(&path)?))?;
    let analyzer = index.analyzer();
    for topic in topics {
        let ranking = match search(kind.query(topic), &analyzer, index, config) {
            Ok(r) => r,
            Err(trecrank_core::SearchError::InvalidConfiguration(reason)) => {
                tracing::warn!(topic = topic.number, %reason, "skipping topic");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let docnos: Vec<String> = ranking.hits.iter().map(|h| docno(index, h.doc_id)).collect();
        let hits = docnos.iter().map(String::as_str).zip(ranking.hits.iter().map(|h| h.score));
        writer.write_hits(topic.number, kind.tag(), hits, &run)?;
    }
    writer.into_inner()?;
    tracing::info!(path = %path.display(), run = %run, "run file written");
    Ok(())
}
