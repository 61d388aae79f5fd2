//! External collaborators: version control, build recipes and the
//! remote systems a release waits on

pub mod git;
pub mod github;
pub mod just;
pub mod pypi;
pub mod registry;
pub mod slack;

pub use git::{Commit, GitCli, Vcs};
pub use github::{CiCompletionCheck, CiRunSource, GitHubClient, PullRequest, PullRequestSource, WorkflowRun};
pub use just::{JustRunner, RecipeRunner};
pub use pypi::PackageIndexCheck;
pub use registry::{parse_image_ref, ImageRef, RegistryCheck};
