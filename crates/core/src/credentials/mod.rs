mod clock;
mod traits;
mod types;
mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use traits::IdentityService;
pub use types::{AssumeRoleRequest, Credential, RoleArn, SessionCredentials};
pub use validation::{
    validate_account_id, validate_duration, validate_role_name, MAX_SESSION_SECS,
    MIN_SESSION_SECS,
};
