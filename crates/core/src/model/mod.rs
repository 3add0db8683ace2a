mod category;
mod grant;
mod ids;
mod lesson;
mod progress;
mod user;

pub use ids::{CategoryId, GrantId, LessonId, ParseIdError, ProgressId, UserId};

pub use category::{Category, CategoryDraft, CategoryError, NewCategory};
pub use grant::{AccessGrant, GrantDraft, GrantError, GrantScope, GrantStatus, NewGrant};
pub use lesson::{Lesson, LessonDraft, LessonError, NewLesson};
pub use progress::ProgressRecord;
pub use user::{NewUser, RegistrationDraft, RegistrationError, User, Viewer};
