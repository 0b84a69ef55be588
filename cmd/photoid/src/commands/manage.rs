//! Operator commands that change identities.

use clap::Args;
use photoid_faces::{ClusterId, FaceId, PersonId, PromoteTarget};
use serde_json::json;

use super::{open_registry, output_result, print_success};
use crate::Cli;

/// Promote clusters to a new or existing person.
#[derive(Args)]
pub struct PromoteCommand {
    /// Cluster ids to promote
    #[arg(required = true)]
    clusters: Vec<u64>,

    /// Name of the new person
    #[arg(long, conflicts_with = "person", required_unless_present = "person")]
    name: Option<String>,

    /// Existing person to merge into
    #[arg(long)]
    person: Option<u64>,
}

impl PromoteCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let reg = open_registry(cli)?;
        let target = match (&self.name, self.person) {
            (_, Some(id)) => PromoteTarget::Person(PersonId(id)),
            (Some(name), None) => PromoteTarget::NewPerson(name.clone()),
            (None, None) => anyhow::bail!("either --name or --person is required"),
        };
        let ids: Vec<ClusterId> = self.clusters.iter().copied().map(ClusterId).collect();
        let pid = reg.promote(&ids, target)?;

        if cli.json {
            return output_result(&json!({ "person": pid }), true);
        }
        print_success(&format!("promoted {} clusters to person {}", ids.len(), pid));
        Ok(())
    }
}

/// A list of cluster or face ids.
#[derive(Args)]
pub struct IdsCommand {
    #[arg(required = true)]
    ids: Vec<u64>,
}

impl IdsCommand {
    pub fn ignore_clusters(&self, cli: &Cli) -> anyhow::Result<()> {
        let n = open_registry(cli)?.ignore_clusters(&self.clusters())?;
        report(cli, "ignored", n, "clusters")
    }

    pub fn unignore_clusters(&self, cli: &Cli) -> anyhow::Result<()> {
        let n = open_registry(cli)?.unignore_clusters(&self.clusters())?;
        report(cli, "restored", n, "clusters")
    }

    pub fn ignore_faces(&self, cli: &Cli) -> anyhow::Result<()> {
        let ids: Vec<FaceId> = self.ids.iter().copied().map(FaceId).collect();
        let n = open_registry(cli)?.ignore_faces(&ids)?;
        report(cli, "ignored", n, "faces")
    }

    fn clusters(&self) -> Vec<ClusterId> {
        self.ids.iter().copied().map(ClusterId).collect()
    }
}

fn report(cli: &Cli, action: &str, n: usize, what: &str) -> anyhow::Result<()> {
    if cli.json {
        return output_result(&json!({ "changed": n }), true);
    }
    print_success(&format!("{action} {n} {what}"));
    Ok(())
}

/// Tag faces as a named person.
#[derive(Args)]
pub struct TagCommand {
    /// Person name; created if nobody has it yet
    name: String,

    /// Face ids to tag
    #[arg(required = true)]
    faces: Vec<u64>,
}

impl TagCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let reg = open_registry(cli)?;
        let ids: Vec<FaceId> = self.faces.iter().copied().map(FaceId).collect();
        let pid = reg.tag_faces(&self.name, &ids)?;

        if cli.json {
            return output_result(&json!({ "person": pid }), true);
        }
        print_success(&format!("tagged {} faces as {} ({})", ids.len(), self.name, pid));
        Ok(())
    }
}

/// Recompute golden vectors.
#[derive(Args)]
pub struct RecomputeCommand {
    /// Person to recompute
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    person: Option<u64>,

    /// Recompute every person
    #[arg(long)]
    all: bool,
}

impl RecomputeCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let reg = open_registry(cli)?;

        let Some(id) = self.person.filter(|_| !self.all) else {
            let n = reg.rebuild_all_identities()?;
            return report(cli, "recomputed", n, "people");
        };

        let used = reg.recompute_identity(PersonId(id))?;
        if cli.json {
            return output_result(&json!({ "person": id, "faces": used }), true);
        }
        match used {
            Some(n) => print_success(&format!("person {id}: golden vector from {n} faces")),
            None => print_success(&format!("person {id}: no usable faces, golden vector kept")),
        }
        Ok(())
    }
}

/// Delete one face.
#[derive(Args)]
pub struct DeleteFaceCommand {
    face: u64,
}

impl DeleteFaceCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        open_registry(cli)?.delete_face(FaceId(self.face))?;
        report(cli, "deleted", 1, "faces")
    }
}

/// Delete every face of a photo.
#[derive(Args)]
pub struct DeletePhotoCommand {
    photo: String,
}

impl DeletePhotoCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let n = open_registry(cli)?.delete_photo(&self.photo)?;
        report(cli, "deleted", n, "faces")
    }
}
