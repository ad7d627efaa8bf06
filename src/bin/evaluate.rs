use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tb_classifier::{
    config::{self, LogLevel},
    evaluation::EvaluationReport,
    load_model,
    model_service::ModelService,
    ort_service::OrtModelService,
    preprocessing::preprocess,
    telemetry,
};

/// Scores a labelled image directory and prints an evaluation report.
///
/// `data_dir` must hold exactly two class folders; in alphabetical order the
/// first is Normal and the second TB.
#[derive(Parser, Debug)]
#[command(name = "evaluate", version)]
struct Args {
    #[arg(long, default_value = "dataset/val")]
    data_dir: PathBuf,

    /// Model file; defaults to the configured candidate chain
    #[arg(long)]
    model: Option<PathBuf>,
}

fn class_dirs(data_dir: &Path) -> anyhow::Result<[PathBuf; 2]> {
    let mut dirs = std::fs::read_dir(data_dir)
        .with_context(|| format!("failed to read {}", data_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    dirs.sort();

    match <[PathBuf; 2]>::try_from(dirs) {
        Ok(dirs) => Ok(dirs),
        Err(dirs) => anyhow::bail!(
            "expected two class directories in {}, found {}",
            data_dir.display(),
            dirs.len()
        ),
    }
}

fn score_directory(
    model: &dyn ModelService,
    dir: &Path,
    is_tb: bool,
    labels: &mut Vec<bool>,
    scores: &mut Vec<f64>,
) -> anyhow::Result<()> {
    let mut files = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();

    for file in files {
        let image_data = std::fs::read(&file)?;
        let input = match preprocess(&image_data) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", file.display(), e);
                continue;
            }
        };
        let score = model
            .predict(&input)
            .with_context(|| format!("inference failed on {}", file.display()))?;

        labels.push(is_tb);
        scores.push(score as f64);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(&LogLevel::Info);

    let model = match &args.model {
        Some(path) => std::sync::Arc::new(OrtModelService::new(path, None)?),
        None => load_model(&config::get_configuration()?.model)?,
    };
    tracing::info!("Evaluating {}", model.model_path().display());

    let [normal_dir, tb_dir] = class_dirs(&args.data_dir)?;
    let mut labels = Vec::new();
    let mut scores = Vec::new();
    score_directory(model.as_ref(), &normal_dir, false, &mut labels, &mut scores)?;
    score_directory(model.as_ref(), &tb_dir, true, &mut labels, &mut scores)?;

    println!("{}", EvaluationReport::new(&labels, &scores));

    Ok(())
}
