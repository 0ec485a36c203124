pub mod role;
pub mod role_assignment;
pub mod step_up;
pub mod two_factor;
pub mod verification_token;

pub use role::{DirectoryVisibility, Permission, Role, RoleScope, UserRoleView};
pub use role_assignment::RoleAssignment;
pub use step_up::{StepUpCheck, StepUpFlag, StepUpOutcome, StepUpState};
pub use two_factor::{TotpSetup, TwoFactorCredential, TwoFactorMethod};
pub use verification_token::{
    SendOutcome, VerificationChannel, VerificationToken, VerifyFailReason, VerifyOutcome,
};
