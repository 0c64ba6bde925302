//! Command-line front end for the picview browsing and classification core.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use picview_core::config::load_settings;
use picview_core::{AppContainer, Event, Topic, export_csv};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "picview", about = "Browse media folders and flag NSFW images")]
struct Args {
    /// Directory holding the classifier models (overrides saved settings).
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List subfolders and one page of media files.
    Browse {
        folder: PathBuf,
        #[arg(long, default_value_t = 0)]
        page: usize,
        /// Defaults to the saved page size.
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Classify individual files.
    Classify {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Strategy tag: nudenet, simple or alternate.
        #[arg(long)]
        classifier: Option<String>,
    },
    /// Classify every media file of a folder and write a CSV report.
    Report {
        folder: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        classifier: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(dir) = args.models_dir {
        settings.models_dir = dir;
    }
    let classifier_config = settings.classifier_config();
    let default_tag = settings.default_classifier.clone();
    let default_page_size = settings.page_size;
    let container = AppContainer::new(settings, classifier_config);

    match args.command {
        Command::Browse {
            folder,
            page,
            page_size,
        } => browse(&container, folder, page, page_size.unwrap_or(default_page_size)),
        Command::Classify { paths, classifier } => {
            classify(&container, &paths, classifier.as_deref().unwrap_or(&default_tag));
            Ok(())
        }
        Command::Report {
            folder,
            out,
            classifier,
        } => report(
            &container,
            folder,
            out,
            classifier.as_deref().unwrap_or(&default_tag),
        ),
    }
}

fn browse(container: &AppContainer, folder: PathBuf, page: usize, page_size: usize) -> Result<()> {
    let listing = container
        .browse_folder()
        .execute(&folder, page, page_size)
        .with_context(|| format!("cannot browse {}", folder.display()))?;

    println!("{} (page {})", listing.folder.path.display(), listing.page);
    for sub in &listing.subfolders {
        println!("  [dir] {}", sub.name);
    }
    for image in &listing.images {
        println!(
            "  {} {}x{} {} bytes",
            image.filename, image.width, image.height, image.size
        );
    }
    info!("{} images on this page", listing.total_images);
    Ok(())
}

fn classify(container: &AppContainer, paths: &[PathBuf], tag: &str) {
    let view = container.view_image();
    let mut vm = container.classification_view_model();
    vm.events().subscribe(Topic::ClassificationCompleted, |event| {
        if let Event::ClassificationCompleted(record) = event {
            println!(
                "  -> {} score={:.3} method={}",
                if record.is_nsfw { "NSFW" } else { "SFW" },
                record.nsfw_score,
                record.classification_method
            );
        }
    });
    vm.events().subscribe(Topic::Error, |event| {
        if let Event::Error(message) = event {
            warn!("{message}");
        }
    });

    for path in paths {
        match view.execute_by_path(path) {
            Ok(image) => {
                println!("{}", image.path.display());
                vm.classify_image(&image.id, tag);
            }
            Err(err) => warn!("{err}"),
        }
    }
}

fn report(container: &AppContainer, folder: PathBuf, out: PathBuf, tag: &str) -> Result<()> {
    let listing = container
        .browse_folder()
        .execute(&folder, 0, usize::MAX)
        .with_context(|| format!("cannot browse {}", folder.display()))?;
    let classify = container.classify_image();

    let mut rows = Vec::with_capacity(listing.images.len());
    for image in listing.images {
        let record = classify.execute(&image.id, tag)?;
        rows.push((image, record));
    }
    export_csv(&rows, &out).with_context(|| format!("cannot write {}", out.display()))?;

    let flagged = rows.iter().filter(|(_, record)| record.is_nsfw).count();
    info!(
        "wrote {} rows ({flagged} flagged) to {}",
        rows.len(),
        out.display()
    );
    Ok(())
}
