#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use newsprep::{PrepConfig, PreprocessedRecord, ResidentTable};

/// Label cycle of the synthetic corpus; row `i` is `TYPES[i % 5]`.
pub const TYPES: [&str; 5] = ["fake", "reliable", "satire", "conspiracy", "political"];

/// Unique, digit-free token for row `i`. Only consonants the stemmer
/// leaves alone are used.
pub fn word(i: usize) -> String {
    const LETTERS: &[u8; 10] = b"bcdfghjkmn";
    let tail: String = i
        .to_string()
        .bytes()
        .map(|d| LETTERS[(d - b'0') as usize] as char)
        .collect();
    format!("ward{tail}")
}

pub fn corpus_row(id: usize, body: usize, label: &str) -> String {
    let w = word(body);
    format!("{id},Story {w},\"{w} report, filed\",{label}\n")
}

/// `<dir>/news.csv` with `rows` distinct articles.
pub fn write_corpus(dir: &Path, rows: usize) -> PathBuf {
    let mut body = String::from("id,title,content,type\n");
    for i in 0..rows {
        body.push_str(&corpus_row(i, i, TYPES[i % TYPES.len()]));
    }
    write_csv(dir, &body)
}

pub fn write_csv(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("news.csv");
    fs::write(&path, body).unwrap();
    path
}

pub fn config(dir: &Path, workers: usize) -> PrepConfig {
    let mut config = PrepConfig {
        data_dir: dir.to_path_buf(),
        corpus_stem: "news".to_string(),
        ..PrepConfig::default()
    };
    config.pool.workers = Some(workers);
    config.pool.chunk_size = 4;
    config.embedding.dim = 3;
    config
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn read_records(path: &Path) -> Vec<PreprocessedRecord> {
    read_lines(path)
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Every token of `records`, sorted and deduplicated.
pub fn vocabulary(records: &[PreprocessedRecord]) -> Vec<String> {
    let mut tokens: Vec<String> = records
        .iter()
        .flat_map(|r| r.content.iter().chain(r.title.iter().flatten()))
        .cloned()
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// Token `k` of `tokens` maps to `[k + 1; dim]`, so no vector is zero.
pub fn table_for(tokens: &[String], dim: usize) -> ResidentTable {
    ResidentTable::from_entries(
        dim,
        tokens
            .iter()
            .enumerate()
            .map(|(k, token)| (token.clone(), vec![(k + 1) as f32; dim])),
    )
    .unwrap()
}

/// Same mapping as [`table_for`], in the word-vector text format.
pub fn write_vec_file(path: &Path, tokens: &[String], dim: usize) {
    let mut body = format!("{} {dim}\n", tokens.len());
    for (k, token) in tokens.iter().enumerate() {
        body.push_str(token);
        for _ in 0..dim {
            body.push_str(&format!(" {}", k + 1));
        }
        body.push('\n');
    }
    fs::write(path, body).unwrap();
}
