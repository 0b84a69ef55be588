//! CLI commands module.

mod ingest;
mod manage;
mod query;
mod util;

pub use ingest::{IngestCommand, ResolvePendingCommand};
pub use manage::{
    DeleteFaceCommand, DeletePhotoCommand, IdsCommand, PromoteCommand, RecomputeCommand,
    TagCommand,
};
pub use query::{ClassifyCommand, ClustersCommand, FacesCommand, PeopleCommand};

pub(crate) use util::*;
