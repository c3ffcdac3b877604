// Command surface of the console: sessions, dashboard, documents, invites.

pub mod applications;
pub mod dashboard;
pub mod documents;
pub mod invites;
pub mod smoke;
