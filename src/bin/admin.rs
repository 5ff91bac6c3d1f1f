//! Admin utility for inspecting the resources and backends of an attack run.
//!
//! Usage:
//!   cargo run --bin admin -- lexicon-info
//!   cargo run --bin admin -- neighbors love --emotional
//!   cargo run --bin admin -- grammar "he go to school"
//!   cargo run --bin admin -- similarity "great coffee" "good coffee"
//!   cargo run --bin admin -- datasets

use affect_attack::candidates::CandidateGenerator;
use affect_attack::config::Config;
use affect_attack::dataset::check_datasets;
use affect_attack::embeddings::create_embedder;
use affect_attack::grammar::{GrammarChecker, LanguageToolClient};
use affect_attack::lexicon::{AffectTable, Lexicon};
use affect_attack::similarity::{EncoderSimilarity, SentenceSimilarity};
use affect_attack::word_vectors::GloveEmbeddings;
use anyhow::Result;
use clap::{Parser, Subcommand};
use prettytable::{Table, row};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "admin")]
#[command(about = "affect-attack admin utilities", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Size, fingerprint and per-emotion coverage of the lexicon
    LexiconInfo,
    /// Substitution candidates for a word
    Neighbors {
        word: String,
        /// Rank as for emotional text (similarity threshold, spectrum distance)
        #[arg(long)]
        emotional: bool,
    },
    /// Run the grammar checker on a text
    Grammar { text: String },
    /// Sentence similarity of two texts
    Similarity { a: String, b: String },
    /// Report bundled datasets missing from the data directory
    Datasets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    affect_attack::init_tracing(&config.runtime.log_level);

    match cli.command {
        Commands::LexiconInfo => lexicon_info(&config),
        Commands::Neighbors { word, emotional } => neighbors(&config, &word, emotional),
        Commands::Grammar { text } => grammar(&config, &text).await,
        Commands::Similarity { a, b } => similarity(&config, &a, &b).await,
        Commands::Datasets => datasets(&config),
    }
}

fn load_lexicon(config: &Config) -> Result<(AffectTable, Lexicon)> {
    let table = AffectTable::load(&config.resources.lexicon_path)?;
    let lexicon = Lexicon::from_table(&table);
    Ok((table, lexicon))
}

fn lexicon_info(config: &Config) -> Result<()> {
    let (table, lexicon) = load_lexicon(config)?;
    println!("raw words:       {}", table.len());
    println!("emotional words: {}", lexicon.len());
    println!("fingerprint:     {}", lexicon.fingerprint());

    let mut table = Table::new();
    table.add_row(row!["emotion", "words"]);
    for emotion in affect_attack::emotion::Emotion::ALL {
        let count = lexicon
            .words()
            .filter_map(|w| lexicon.spectrum(w))
            .filter(|s| s.get(emotion) > 0.0)
            .count();
        table.add_row(row![emotion, count]);
    }
    table.printstd();
    Ok(())
}

fn neighbors(config: &Config, word: &str, emotional: bool) -> Result<()> {
    let (_, lexicon) = load_lexicon(config)?;
    let vectors = GloveEmbeddings::load(
        &config.resources.word_vectors_path,
        config.resources.vocabulary_limit,
    )?;
    let generator = CandidateGenerator::new(
        &vectors,
        &lexicon,
        config.attack.neighbor_count,
        config.attack.word_similarity,
    );

    let mut table = Table::new();
    if emotional {
        table.add_row(row!["candidate", "similarity", "spectrum distance"]);
        for c in generator.candidates_for_emotional_word(word)? {
            table.add_row(row![
                c.word,
                format!("{:.4}", c.similarity),
                format!("{:.4}", c.distance)
            ]);
        }
    } else {
        table.add_row(row!["candidate"]);
        for c in generator.candidates_for_neutral_word(word)? {
            table.add_row(row![c]);
        }
    }
    table.printstd();
    Ok(())
}

async fn grammar(config: &Config, text: &str) -> Result<()> {
    let client = LanguageToolClient::new(
        config.grammar.url.clone(),
        config.grammar.language.clone(),
        config.grammar.requests_per_second,
        config.grammar.timeout_ms,
        config.grammar.retries,
    )?;
    let issues = client.check(text).await?;
    if issues.is_empty() {
        println!("✅ No issues");
        return Ok(());
    }
    let mut table = Table::new();
    table.add_row(row!["rule", "span", "message", "suggestion"]);
    for issue in &issues {
        table.add_row(row![
            issue.rule_id,
            format!("{}..{}", issue.offset, issue.offset + issue.length),
            issue.message,
            issue.replacements.first().map(String::as_str).unwrap_or("-")
        ]);
    }
    table.printstd();
    println!("corrected: {}", client.correct(text, &issues));
    Ok(())
}

async fn similarity(config: &Config, a: &str, b: &str) -> Result<()> {
    let embedder = create_embedder(
        &config.similarity,
        config.runtime.openai_api_key.as_deref(),
    )
    .await?;
    let sim = EncoderSimilarity::new(Arc::clone(&embedder), 2);
    let score = sim.similarity(a, b).await?;
    let verdict = if score >= config.attack.sentence_similarity {
        "passes"
    } else {
        "fails"
    };
    println!(
        "similarity {:.4} ({} the {:.2} threshold, provider={}, dims={})",
        score,
        verdict,
        config.attack.sentence_similarity,
        config.similarity.provider,
        embedder.dimensions()
    );
    Ok(())
}

fn datasets(config: &Config) -> Result<()> {
    let missing = check_datasets(&config.batch.data_dir);
    if missing.is_empty() {
        println!("✅ All datasets present in {}", config.batch.data_dir.display());
        return Ok(());
    }
    for spec in missing {
        println!("❌ {} missing ({})", spec.name, spec.path.display());
    }
    Ok(())
}
