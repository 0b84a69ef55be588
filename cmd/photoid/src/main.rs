//! photoid - operator CLI for face identity resolution.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    ClassifyCommand, ClustersCommand, DeleteFaceCommand, DeletePhotoCommand, FacesCommand,
    IdsCommand, IngestCommand, PeopleCommand, PromoteCommand, RecomputeCommand,
    ResolvePendingCommand, TagCommand,
};

/// photoid - resolve detected faces to people and clusters.
///
/// Detections are ingested one photo at a time. Faces that match a known
/// person are assigned to them, the rest are grouped into unnamed clusters
/// that an operator can promote, ignore or tag by hand.
#[derive(Parser)]
#[command(name = "photoid")]
#[command(about = "Face identity resolution CLI")]
#[command(version)]
pub struct Cli {
    /// Config file (YAML or JSON); defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Identity database file
    #[arg(long, global = true, default_value = "photoid.redb")]
    pub db: String,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest detection files, one photo per file
    Ingest(IngestCommand),
    /// Show where an embedding would be assigned, without writing
    Classify(ClassifyCommand),
    /// Re-resolve faces without a live owner
    ResolvePending(ResolvePendingCommand),
    /// Promote clusters to a new or existing person
    Promote(PromoteCommand),
    /// Ignore clusters and their faces
    Ignore(IdsCommand),
    /// Restore ignored clusters
    Unignore(IdsCommand),
    /// Ignore individual faces
    IgnoreFaces(IdsCommand),
    /// Tag faces as a named person
    Tag(TagCommand),
    /// Recompute golden vectors
    Recompute(RecomputeCommand),
    /// List clusters
    Clusters(ClustersCommand),
    /// List or search people
    People(PeopleCommand),
    /// List faces
    Faces(FacesCommand),
    /// Delete one face
    DeleteFace(DeleteFaceCommand),
    /// Delete every face of a photo
    DeletePhoto(DeletePhotoCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; -v raises the default to debug.
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Ingest(cmd) => cmd.run(&cli),
        Commands::Classify(cmd) => cmd.run(&cli),
        Commands::ResolvePending(cmd) => cmd.run(&cli),
        Commands::Promote(cmd) => cmd.run(&cli),
        Commands::Ignore(cmd) => cmd.ignore_clusters(&cli),
        Commands::Unignore(cmd) => cmd.unignore_clusters(&cli),
        Commands::IgnoreFaces(cmd) => cmd.ignore_faces(&cli),
        Commands::Tag(cmd) => cmd.run(&cli),
        Commands::Recompute(cmd) => cmd.run(&cli),
        Commands::Clusters(cmd) => cmd.run(&cli),
        Commands::People(cmd) => cmd.run(&cli),
        Commands::Faces(cmd) => cmd.run(&cli),
        Commands::DeleteFace(cmd) => cmd.run(&cli),
        Commands::DeletePhoto(cmd) => cmd.run(&cli),
    }
}
