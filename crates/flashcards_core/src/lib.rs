pub mod access;
pub mod domain;
pub mod generation;
pub mod library;
pub mod memory;
pub mod ports;
pub mod sharing;
pub mod subscription;
pub mod validation;

pub use access::{AccessControl, Action, Decision};
pub use domain::{
    Collection, CollectionChanges, Flashcard, FlashcardChanges, GeneratedCard, GenerationInput,
    GenerationLog, GenerationRequest, NewCollection, NewFlashcard, NewShare, PeriodStatus,
    PeriodWindow, Plan, SessionClaims, SessionToken, Share, SharePermission, SharedCollection,
    SubscriptionPeriod, User, UserCredentials,
};
pub use generation::{daily_generation_limit, Generation, GenerationService, GenerationUsage};
pub use library::Library;
pub use memory::InMemoryDatabase;
pub use ports::{
    CredentialVerifier, DatabaseService, FlashcardGenerator, PortError, PortResult, SessionIssuer,
};
pub use sharing::{RandomShareCodes, ShareCodeSource, SharingManager};
pub use subscription::{Cancellation, SubscriptionMachine, SubscriptionState, Upgrade};
