pub mod html;
pub mod prompt;
pub mod session;

pub use session::{ChatSession, SessionError};
pub use upkeep_chat_client::{ClientConfig, ClientError, GenerativeClient, Part, Role, Turn};
