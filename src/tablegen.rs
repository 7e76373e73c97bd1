//! Generates synthetic annotation tables, loads them concurrently, and
//! prints a summary of the resulting concatenated table.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use annotab::{
    AffineTransform3D, AnnotationListener, AnnotationTableModel, AsyncTableLoader,
    ConcatenatedAnnotationTableModel, DynTableModel, LoadResult, SegmentAnnotation,
    SyntheticTableSource,
};
use anyhow::{bail, Result};
use log::info;

struct Config {
    num_sources: usize,
    rows_per_source: usize,
    seed: u64,
    batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_sources: 3,
            rows_per_source: 10_000,
            seed: 42,
            batch_size: 256,
        }
    }
}

fn parse_args() -> Result<Config> {
    let mut config = Config::default();
    let args: Vec<String> = std::env::args().collect();

    fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
        match args.get(i) {
            Some(value) => Ok(value),
            None => bail!("missing value for {}", flag),
        }
    }

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sources" => {
                i += 1;
                config.num_sources = value_of(&args, i, "--sources")?.parse()?;
            }
            "--rows" => {
                i += 1;
                config.rows_per_source = value_of(&args, i, "--rows")?.parse()?;
            }
            "--seed" => {
                i += 1;
                config.seed = value_of(&args, i, "--seed")?.parse()?;
            }
            "--batch-size" => {
                i += 1;
                config.batch_size = value_of(&args, i, "--batch-size")?.parse()?;
            }
            "--help" | "-h" => {
                println!(
                    "Usage: annotab-tablegen [--sources N] [--rows N] [--seed N] [--batch-size N]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {}", other),
        }
        i += 1;
    }

    if config.num_sources == 0 {
        bail!("--sources must be at least 1");
    }

    Ok(config)
}

/// Counts arrivals on the concatenated table while loaders are running.
struct ProgressListener {
    rows_seen: AtomicUsize,
}

impl AnnotationListener<SegmentAnnotation> for ProgressListener {
    fn annotation_added(&self, _annotation: &Arc<SegmentAnnotation>) {
        let seen = self.rows_seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen % 10_000 == 0 {
            info!("{} rows indexed", seen);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let config = parse_args()?;

    let sources: Vec<SyntheticTableSource> = (0..config.num_sources)
        .map(|i| {
            SyntheticTableSource::with_config(
                format!("synthetic-{}", i),
                config.rows_per_source,
                config.seed + i as u64,
            )
        })
        .collect();

    let tables: Vec<Arc<DynTableModel<SegmentAnnotation>>> = sources
        .iter()
        .map(|source| Arc::new(DynTableModel::Source(source.create_table())))
        .collect();

    // Concatenate before loading so every row is observed live.
    let concat = ConcatenatedAnnotationTableModel::new(tables.clone())?;
    let progress = Arc::new(ProgressListener {
        rows_seen: AtomicUsize::new(0),
    });
    concat.add_listener(progress.clone());

    info!(
        "loading {} sources with {} rows each",
        config.num_sources, config.rows_per_source
    );

    let mut loaders: Vec<AsyncTableLoader> = Vec::new();
    for (source, table) in sources.iter().zip(&tables) {
        let mut loader = AsyncTableLoader::new();
        let source = source.clone();
        loader.start_load(
            table.clone(),
            move || Ok(source.generate_annotations()),
            config.batch_size,
        );
        loaders.push(loader);
    }

    let mut rows_published = 0;
    for loader in &mut loaders {
        loop {
            match loader.check_completion() {
                LoadResult::Success {
                    rows_published: rows,
                } => {
                    rows_published += rows;
                    break;
                }
                LoadResult::Error(message) => bail!("load failed: {}", message),
                LoadResult::None => std::thread::sleep(Duration::from_millis(5)),
            }
        }
    }

    println!("data store:     {}", concat.data_store());
    println!("member tables:  {}", config.num_sources);
    println!("rows published: {}", rows_published);
    println!("rows indexed:   {}", concat.num_annotations());
    println!("columns:        {}", concat.column_names().join(", "));

    concat.request_columns("morphology");
    println!(
        "column groups:  {}",
        concat.loaded_column_paths().join(", ")
    );

    // Shift the display frame and show the anchors following it.
    let before = concat.get_min_max("anchor_x");
    concat.transform(&AffineTransform3D::translation(500.0, 0.0, 0.0));
    let after = concat.get_min_max("anchor_x");

    for column in concat.numeric_column_names() {
        if let Some((min, max)) = concat.get_min_max(&column) {
            println!("{:<24} min {:>12.3}  max {:>12.3}", column, min, max);
        }
    }
    if let (Some(before), Some(after)) = (before, after) {
        println!(
            "anchor_x range moved from [{:.1}, {:.1}] to [{:.1}, {:.1}]",
            before.0, before.1, after.0, after.1
        );
    }

    Ok(())
}
