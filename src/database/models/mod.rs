pub mod account;
pub mod feedback;
pub mod request;
pub mod visit;

pub use account::{Account, AccountChanges, NewAccount};
pub use feedback::{Feedback, NewFeedback};
pub use request::{NewRequest, ServiceRequest};
pub use visit::{NewVisit, Photo, Visit, VisitDetail};
