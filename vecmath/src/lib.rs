pub mod cosine;
pub mod error;
pub mod mean;
pub mod nearest;
pub mod text;

pub use cosine::{MAX_DISTANCE, cosine_distance, dot, norm};
pub use error::VecError;
pub use mean::{is_valid, mean, running_mean_add, running_mean_remove};
pub use nearest::{Match, nearest};
pub use text::{format_vector, parse_vector};
