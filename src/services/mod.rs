pub mod class_service;
pub mod conflict;
pub mod lifecycle;
pub mod locks;
pub mod request_service;

pub use class_service::ClassService;
pub use conflict::{Collision, ensure_no_conflicts, lecturer_conflict, place_conflict};
pub use locks::{LockKey, ScheduleGuard, ScheduleLocks};
pub use request_service::RequestService;
