mod augment;
mod composer;
mod message;
mod session;

pub use augment::{MAX_CONTEXT_RESULTS, augmented_prompt, build_search_context};
pub use composer::{Composer, Draft};
pub use message::{Attachment, AttachmentId, Message, MessageId, MessageLog};
pub use session::{
    AttachOutcome, ChatSession, CompletedTurn, ERROR_PREFIX, IMAGE_PLACEHOLDER, PendingTurn,
    SubmitOutcome, SubmitRejected, Submission,
};
