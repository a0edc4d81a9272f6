pub mod aws;
pub mod directory;
pub mod types;

pub use aws::AwsDirectory;
pub use directory::{DirectoryError, DirectoryService, NewAccount};
pub use types::{Role, UserProfile};
