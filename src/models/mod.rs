pub mod session;
pub mod tab;

pub use session::{AppendMode, Session, SessionOverview, SessionPatch};
pub use tab::{PageContent, TabCapture};
