pub mod assignment;
pub mod resolver;
pub mod step_up;
pub mod two_factor;
pub mod verification;

pub use assignment::{AssignmentOptions, RoleAssignmentService};
pub use resolver::PermissionResolver;
pub use step_up::StepUpService;
pub use two_factor::TwoFactorService;
pub use verification::{VerificationPolicy, VerificationService};
