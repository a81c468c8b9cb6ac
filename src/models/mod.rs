pub mod course;
pub mod feedback;
pub mod holiday;
pub mod hhmm;

pub use course::{Course, CourseRow, NewCourseRequest, DEFAULT_COLOR, UNSAVED_ID};
pub use feedback::{Feedback, NewFeedbackRequest, ScoreRequest};
pub use holiday::{Holiday, HolidayKind, HolidayRequest};
