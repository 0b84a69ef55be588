//! Read-only commands.

use clap::Args;
use photoid_faces::{Classification, ClusterId, Face, PersonId, Registry};
use photoid_vecmath::parse_vector;

use super::{open_registry, output_result, preview};
use crate::Cli;

/// Show where an embedding would be assigned, without writing.
#[derive(Args)]
pub struct ClassifyCommand {
    /// Embedding literal, e.g. "[0.12,-0.03,...]"
    embedding: String,
}

impl ClassifyCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let reg = open_registry(cli)?;
        let embedding = parse_vector(&self.embedding)?;
        let result = reg.classify(&embedding)?;

        if cli.json {
            return output_result(&result, true);
        }
        match result {
            Classification::Person { id, distance } => {
                let name = reg.person(id)?.map(|p| p.name).unwrap_or_default();
                println!("person {id} ({name}), distance {distance:.4}");
            }
            Classification::Cluster { id, distance } => {
                println!("cluster {id}, distance {distance:.4}");
            }
            Classification::NewCluster => println!("new cluster"),
        }
        Ok(())
    }
}

/// List clusters.
#[derive(Args)]
pub struct ClustersCommand {
    /// Include ignored clusters
    #[arg(long)]
    all: bool,
}

impl ClustersCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let clusters = open_registry(cli)?.list_clusters(self.all)?;
        if cli.json {
            return output_result(&clusters, true);
        }

        println!("{:>8} {:>6} {:>8} {:>8}  CENTROID", "ID", "FACES", "IGNORED", "REP");
        for c in &clusters {
            let rep = c.representative.map(|f| f.to_string()).unwrap_or_else(|| "-".into());
            println!(
                "{:>8} {:>6} {:>8} {:>8}  {}",
                c.id,
                c.face_count,
                if c.ignored { "yes" } else { "" },
                rep,
                preview(&c.centroid)
            );
        }
        Ok(())
    }
}

/// List or search people.
#[derive(Args)]
pub struct PeopleCommand {
    /// Only people whose name starts with this (case-insensitive)
    #[arg(long)]
    search: Option<String>,
}

impl PeopleCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let reg = open_registry(cli)?;
        let people = match &self.search {
            Some(prefix) => reg.search_people(prefix)?,
            None => reg.list_people()?,
        };
        if cli.json {
            return output_result(&people, true);
        }

        println!("{:>8}  {:<24}  GOLDEN", "ID", "NAME");
        for p in &people {
            let golden = p.golden.as_deref().map(preview).unwrap_or_else(|| "-".into());
            println!("{:>8}  {:<24}  {}", p.id, p.name, golden);
        }
        Ok(())
    }
}

/// List faces.
#[derive(Args)]
pub struct FacesCommand {
    /// Faces of this person
    #[arg(long, conflicts_with_all = ["cluster", "photo"])]
    person: Option<u64>,

    /// Faces of this cluster
    #[arg(long, conflicts_with = "photo")]
    cluster: Option<u64>,

    /// Faces detected on this photo
    #[arg(long)]
    photo: Option<String>,

    /// Page number, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Faces per page
    #[arg(long, default_value_t = photoid_faces::DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

impl FacesCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let reg = open_registry(cli)?;

        let faces = if let Some(id) = self.person {
            reg.faces_for_person(PersonId(id))?
        } else if let Some(id) = self.cluster {
            reg.faces_for_cluster(ClusterId(id))?
        } else if let Some(photo) = &self.photo {
            reg.photo_faces(photo)?
        } else {
            let page = reg.list_faces(self.page, self.page_size)?;
            if cli.json {
                return output_result(&page, true);
            }
            print_faces(&reg, &page.faces)?;
            println!("page {}/{} ({} faces)", page.page, page.total_pages, page.total);
            return Ok(());
        };

        if cli.json {
            return output_result(&faces, true);
        }
        print_faces(&reg, &faces)
    }
}

fn print_faces(reg: &Registry, faces: &[Face]) -> anyhow::Result<()> {
    println!(
        "{:>8}  {:<24} {:>3}  {:<18} {:>8} {:>6}",
        "ID", "PHOTO", "#", "OWNER", "DIST", "CONF"
    );
    for f in faces {
        let dist = reg
            .owner_distance(f)?
            .map(|d| format!("{d:.4}"))
            .unwrap_or_else(|| "-".into());
        let conf = f.confidence.map(|c| format!("{c:.2}")).unwrap_or_else(|| "-".into());
        let owner = if f.ignored {
            format!("{} (ignored)", f.assignment)
        } else {
            f.assignment.to_string()
        };
        println!(
            "{:>8}  {:<24} {:>3}  {:<18} {:>8} {:>6}",
            f.id, f.photo, f.face_index, owner, dist, conf
        );
    }
    Ok(())
}
