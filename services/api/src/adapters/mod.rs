pub mod credentials;
pub mod db;
pub mod generator;
pub mod session;

pub use credentials::Argon2Credentials;
pub use db::DbAdapter;
pub use generator::{DisabledGenerator, OpenAiFlashcardGenerator};
pub use session::JwtSessionIssuer;
