//! Detection ingest commands.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use clap::Args;
use photoid_faces::{FaceSet, IngestReport, Outcome, Registry};
use serde::Serialize;
use tracing::{error, info};

use super::{load_request, open_registry, output_result, print_success, print_warning};
use crate::Cli;

/// Ingest detection files, one photo per file.
#[derive(Args)]
pub struct IngestCommand {
    /// Detection files (YAML or JSON face sets)
    #[arg(required = true)]
    files: Vec<String>,

    /// Number of photos resolved concurrently
    #[arg(short = 'w', long, default_value_t = 1)]
    workers: usize,
}

#[derive(Serialize)]
struct IngestSummary {
    photos: usize,
    faces: usize,
    resolved: usize,
    skipped: usize,
    failed: usize,
    errors: Vec<FileError>,
    reports: Vec<IngestReport>,
}

#[derive(Serialize)]
struct FileError {
    file: String,
    error: String,
}

impl IngestCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let reg = open_registry(cli)?;
        let workers = self.workers.min(self.files.len()).max(1);

        // Each worker claims the next unprocessed file, so no file is
        // ingested twice however many workers run.
        let cursor = AtomicUsize::new(0);
        let reports = Mutex::new(Vec::new());
        let errors = Mutex::new(Vec::new());

        thread::scope(|s| {
            for worker in 0..workers {
                let (reg, cursor, reports, errors) = (&reg, &cursor, &reports, &errors);
                s.spawn(move || {
                    loop {
                        let idx = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(file) = self.files.get(idx) else {
                            break;
                        };
                        match ingest_file(reg, file) {
                            Ok(report) => push(reports, report),
                            Err(e) => {
                                error!(worker, %file, error = %e, "ingest failed");
                                push(errors, FileError {
                                    file: file.clone(),
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                });
            }
        });

        let mut reports = reports.into_inner().unwrap_or_else(|e| e.into_inner());
        reports.sort_by(|a, b| a.photo.cmp(&b.photo));
        let errors = errors.into_inner().unwrap_or_else(|e| e.into_inner());

        let summary = IngestSummary {
            photos: reports.len(),
            faces: reports.iter().map(|r| r.faces.len()).sum(),
            resolved: reports.iter().map(IngestReport::resolved).sum(),
            skipped: reports.iter().map(IngestReport::skipped).sum(),
            failed: reports.iter().map(IngestReport::failed).sum(),
            errors,
            reports,
        };
        info!(
            photos = summary.photos,
            faces = summary.faces,
            resolved = summary.resolved,
            "ingest finished"
        );

        if cli.json {
            output_result(&summary, true)?;
        } else {
            print_success(&format!(
                "{} photos, {} faces: {} resolved, {} skipped, {} failed",
                summary.photos, summary.faces, summary.resolved, summary.skipped, summary.failed
            ));
            for e in &summary.errors {
                print_warning(&format!("{}: {}", e.file, e.error));
            }
        }

        if !summary.errors.is_empty() {
            anyhow::bail!("{} of {} files failed", summary.errors.len(), self.files.len());
        }
        Ok(())
    }
}

fn push<T>(list: &Mutex<Vec<T>>, item: T) {
    list.lock().unwrap_or_else(|e| e.into_inner()).push(item);
}

/// Ingests one face set. A set without a photo reference is named after
/// its file.
fn ingest_file(reg: &Registry, file: &str) -> anyhow::Result<IngestReport> {
    let mut set: FaceSet = load_request(file)?;
    if set.photo.trim().is_empty() {
        set.photo = Path::new(file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file)
            .to_string();
    }
    Ok(reg.ingest(&set.photo, &set.faces)?)
}

/// Re-resolve faces that have no live owner.
#[derive(Args)]
pub struct ResolvePendingCommand {}

impl ResolvePendingCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let report = IngestReport {
            photo: String::new(),
            faces: open_registry(cli)?.resolve_unassigned()?,
        };

        if cli.json {
            return output_result(&report.faces, true);
        }
        print_success(&format!(
            "{} pending faces: {} resolved, {} skipped, {} failed",
            report.faces.len(),
            report.resolved(),
            report.skipped(),
            report.failed()
        ));
        for f in &report.faces {
            if let Outcome::Failed { error } = &f.outcome {
                print_warning(&format!("face {}: {}", f.face, error));
            }
        }
        Ok(())
    }
}
