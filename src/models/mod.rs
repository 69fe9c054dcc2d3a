pub mod class;
pub mod lecturer;
pub mod patch;
pub mod ticket;

pub use class::{
    AssignTeacherRequest, Class, ClassDetail, ClassInfo, ClassStatus, NewClass, NewClassRequest,
    StatusChange, UpdateClassRequest,
};
pub use lecturer::{Lecturer, User};
pub use patch::Patch;
pub use ticket::{
    ClassAssignmentRequestInfo, ClassRequestBody, LeaveRef, LeaveRequestBody, MessageResponse,
    NewTicket, Ticket, TicketStatus,
};
