use crate::analyzer::Analyzer;
use crate::config::{AnalyzerConfig, LengthNorm, Schema};
use crate::error::AccessError;
use crate::index::{InvertedIndex, Posting, StoredDocument};
use crate::postings::PostingsAccessor;
use crate::stats::FieldStatistics;
use crate::term::Term;
use crate::{DocId, TermId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
    pub norm: LengthNorm,
    pub analyzer: AnalyzerConfig,
    pub schema: Schema,
}

pub type Dictionary = (HashMap<Term, TermId>, Vec<u32>);

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn lengths(&self) -> PathBuf { self.root.join("lengths.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn postings_dir(&self) -> PathBuf { self.root.join("postings") }
    fn postings_file(&self, term_id: TermId) -> PathBuf { self.postings_dir().join(format!("{term_id:08}.postings.bin")) }
}

fn write_bin<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, value)?;
    w.flush()?;
    Ok(())
}

fn read_bin<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn save_dictionary(paths: &IndexPaths, dict: &Dictionary) -> Result<()> {
    create_dir_all(&paths.root)?;
    write_bin(&paths.dictionary(), dict)
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<Dictionary> {
    read_bin(&paths.dictionary())
}

pub fn save_docs(paths: &IndexPaths, docs: &[StoredDocument]) -> Result<()> {
    write_bin(&paths.docs(), docs)
}

pub fn load_docs(paths: &IndexPaths) -> Result<Vec<StoredDocument>> {
    read_bin(&paths.docs())
}

pub fn save_lengths(paths: &IndexPaths, lengths: &HashMap<String, Vec<u32>>) -> Result<()> {
    write_bin(&paths.lengths(), lengths)
}

pub fn load_lengths(paths: &IndexPaths) -> Result<HashMap<String, Vec<u32>>> {
    read_bin(&paths.lengths())
}

pub fn save_postings_for_term(paths: &IndexPaths, term_id: TermId, postings: &[Posting]) -> Result<()> {
    create_dir_all(paths.postings_dir())?;
    write_bin(&paths.postings_file(term_id), postings)
}

pub fn load_postings_for_term(paths: &IndexPaths, term_id: TermId) -> Result<Vec<Posting>> {
    read_bin(&paths.postings_file(term_id))
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let meta: MetaFile = serde_json::from_reader(BufReader::new(f))?;
    if meta.version != FORMAT_VERSION {
        anyhow::bail!("unsupported index format version {} (expected {FORMAT_VERSION})", meta.version);
    }
    Ok(meta)
}

/// Write every part of `index` under `paths.root`.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex, created_at: &str) -> Result<()> {
    let df: Vec<u32> = index.postings.iter().map(|p| p.len() as u32).collect();
    save_dictionary(paths, &(index.dictionary.clone(), df))?;
    for (term_id, postings) in index.postings.iter().enumerate() {
        save_postings_for_term(paths, term_id as TermId, postings)?;
    }
    save_lengths(paths, &index.field_lengths)?;
    save_docs(paths, &index.docs)?;
    let meta = MetaFile {
        num_docs: index.num_docs(),
        created_at: created_at.to_string(),
        version: FORMAT_VERSION,
        norm: index.norm,
        analyzer: index.analyzer().config(),
        schema: index.schema.clone(),
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, num_terms = index.dictionary.len(), "index saved");
    Ok(())
}

/// Read a whole index back into memory.
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let meta = load_meta(paths)?;
    let (dictionary, df) = load_dictionary(paths)?;
    let mut postings = Vec::with_capacity(df.len());
    for term_id in 0..df.len() {
        postings.push(load_postings_for_term(paths, term_id as TermId)?);
    }
    let mut index = InvertedIndex::new(meta.schema, meta.norm, Analyzer::new(meta.analyzer));
    index.dictionary = dictionary;
    index.postings = postings;
    index.field_lengths = load_lengths(paths)?;
    index.docs = load_docs(paths)?;
    Ok(index)
}

/// Postings accessor that keeps the header in memory and reads a term's
/// postings file only when the term is queried.
pub struct DiskIndex {
    paths: IndexPaths,
    pub meta: MetaFile,
    dictionary: HashMap<Term, TermId>,
    df: Vec<u32>,
    field_lengths: HashMap<String, Vec<u32>>,
    docs: Vec<StoredDocument>,
}

impl DiskIndex {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let paths = IndexPaths::new(root);
        let meta = load_meta(&paths)?;
        let (dictionary, df) = load_dictionary(&paths)?;
        let field_lengths = load_lengths(&paths)?;
        let docs = load_docs(&paths)?;
        Ok(Self { paths, meta, dictionary, df, field_lengths, docs })
    }

    pub fn analyzer(&self) -> Analyzer {
        Analyzer::new(self.meta.analyzer)
    }

    pub fn stored_field(&self, doc: DocId, name: &str) -> Option<&str> {
        self.docs.get(doc as usize).and_then(|d| d.get(name))
    }

    fn lengths_of(&self, field: &str, operation: &'static str) -> std::result::Result<&[u32], AccessError> {
        self.field_lengths
            .get(field)
            .map(Vec::as_slice)
            .ok_or_else(|| AccessError::new(operation, format!("field {field} is not indexed")))
    }
}

impl PostingsAccessor for DiskIndex {
    fn postings(&self, term: &Term) -> std::result::Result<Vec<(DocId, u32)>, AccessError> {
        let Some(&term_id) = self.dictionary.get(term) else {
            return Ok(Vec::new());
        };
        let postings = load_postings_for_term(&self.paths, term_id)
            .map_err(|e| AccessError::new("postings", format!("{term}: {e:#}")))?;
        Ok(postings.into_iter().map(|p| (p.doc_id, p.freq)).collect())
    }

    fn document_frequency(&self, term: &Term) -> std::result::Result<u32, AccessError> {
        Ok(self.dictionary.get(term).and_then(|&tid| self.df.get(tid as usize)).copied().unwrap_or(0))
    }

    fn total_documents(&self) -> std::result::Result<u32, AccessError> {
        Ok(self.meta.num_docs)
    }

    fn normalized_length(&self, doc: DocId, field: &str) -> std::result::Result<f64, AccessError> {
        let tokens = self.lengths_of(field, "normalized_length")?.get(doc as usize).copied().unwrap_or(0);
        Ok(self.meta.norm.apply(tokens))
    }

    fn field_length(&self, doc: DocId, field: &str) -> std::result::Result<u32, AccessError> {
        Ok(self.lengths_of(field, "field_length")?.get(doc as usize).copied().unwrap_or(0))
    }

    fn field_statistics(&self, field: &str) -> std::result::Result<FieldStatistics, AccessError> {
        let lens = self.lengths_of(field, "field_statistics")?;
        Ok(FieldStatistics {
            doc_count: lens.iter().filter(|&&l| l > 0).count() as u32,
            total_tokens: lens.iter().map(|&l| l as u64).sum(),
        })
    }
}
