pub mod tenant;
pub mod usage;
pub mod user;

pub use tenant::{SubscriptionRecord, SubscriptionStatus, TenantRecord};
pub use usage::UsageCounter;
pub use user::UserRecord;
