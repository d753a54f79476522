use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ollachat_llm::{ChatProvider, ChatRequest, ProviderMessage, ProviderResult, Role};
use ollachat_search::SearchProvider;
use snafu::Snafu;

use super::augment::{augmented_prompt, build_search_context};
use super::composer::{Composer, Draft};
use super::message::{Message, MessageId, MessageLog};
use crate::attachments::{SelectedFile, load_selected_file};

/// Stored content for a turn that carries only images.
pub const IMAGE_PLACEHOLDER: &str = "[Image]";

/// Prefix of assistant turns that report a failed request.
pub const ERROR_PREFIX: &str = "Error:";

/// Why a submission was refused before anything changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum SubmitRejected {
    #[snafu(display("nothing to send: text and images are both empty"))]
    EmptyInput,
    #[snafu(display("a reply is still pending"))]
    RequestInFlight,
}

/// Outcome of the synchronous half of a submission.
pub enum Submission {
    /// An existing message was rewritten locally; nothing goes over the network.
    Edited(MessageId),
    /// The edit target is gone (for example after `clear`); the input was discarded.
    EditTargetMissing(MessageId),
    /// A user turn was appended and a reply must be fetched.
    Pending(PendingTurn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Edited(MessageId),
    EditTargetMissing(MessageId),
    Replied {
        user_message_id: MessageId,
        assistant_message_id: MessageId,
        failed: bool,
    },
    /// The conversation was cleared while the request ran; the reply was dropped.
    ReplyDiscarded(MessageId),
}

/// Result of handing a picked file to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    QueuedImage,
    Appended(MessageId),
}

/// Holds the single in-flight slot; releasing happens on drop so every exit path clears it.
struct InFlightTicket(Arc<AtomicBool>);

impl InFlightTicket {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A submitted user turn waiting for its reply.
///
/// Owns everything the network half needs, so the session stays free to be
/// rendered while the request runs.
pub struct PendingTurn {
    user_message_id: MessageId,
    question: String,
    content: String,
    images: Vec<Vec<u8>>,
    search_enabled: bool,
    history: Vec<ProviderMessage>,
    model: String,
    chat: Arc<dyn ChatProvider>,
    search: Arc<dyn SearchProvider>,
    ticket: InFlightTicket,
}

/// A finished request, ready to be reconciled into the log.
pub struct CompletedTurn {
    user_message_id: MessageId,
    reply: ProviderResult<String>,
    ticket: InFlightTicket,
}

impl PendingTurn {
    pub fn user_message_id(&self) -> MessageId {
        self.user_message_id
    }

    /// Runs the optional search step and then the single chat call.
    pub async fn resolve(self) -> CompletedTurn {
        let outbound = self.outbound_message().await;

        let mut messages = self.history;
        messages.push(outbound);
        let request = ChatRequest::new(self.model, messages);

        tracing::debug!(
            provider = %self.chat.name(),
            model = %request.model,
            message_count = request.messages.len(),
            "requesting assistant reply"
        );
        let reply = self.chat.chat(request).await;

        CompletedTurn {
            user_message_id: self.user_message_id,
            reply,
            ticket: self.ticket,
        }
    }

    async fn outbound_message(&self) -> ProviderMessage {
        if self.search_enabled && !self.question.is_empty() {
            let results = self.search.search(&self.question).await;
            if results.is_empty() {
                tracing::info!("web search returned nothing; sending an empty context block");
            } else {
                tracing::debug!(
                    result_count = results.len(),
                    "augmenting prompt with search results"
                );
            }

            // The augmented turn is text only; the stored user message keeps its images.
            let context = build_search_context(&results);
            return ProviderMessage::new(Role::User, augmented_prompt(&self.question, &context));
        }

        ProviderMessage::new(Role::User, self.content.clone()).with_images(self.images.clone())
    }
}

impl CompletedTurn {
    pub fn user_message_id(&self) -> MessageId {
        self.user_message_id
    }
}

/// Chat orchestrator: owns the transcript and pending input, and drives one
/// request at a time against the injected chat and search backends.
pub struct ChatSession {
    log: MessageLog,
    composer: Composer,
    chat: Arc<dyn ChatProvider>,
    search: Arc<dyn SearchProvider>,
    in_flight: Arc<AtomicBool>,
}

impl ChatSession {
    pub fn new(chat: Arc<dyn ChatProvider>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            log: MessageLog::new(),
            composer: Composer::default(),
            chat,
            search,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    /// True between submitting a turn and reconciling its reply.
    pub fn is_awaiting_reply(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether the send control should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.composer.is_empty() && !self.is_awaiting_reply()
    }

    /// Puts a user message into the composer for correction.
    ///
    /// Only user turns are editable; returns false for unknown ids and other roles.
    pub fn begin_edit(&mut self, id: MessageId) -> bool {
        let Some(message) = self.log.get(id) else {
            return false;
        };
        if message.role() != Role::User {
            return false;
        }

        let content = message.content().to_string();
        self.composer.set_text(content);
        self.composer.set_editing(Some(id));
        true
    }

    pub fn cancel_edit(&mut self) {
        self.composer.set_editing(None);
        self.composer.set_text(String::new());
    }

    /// Discards the whole transcript.
    pub fn clear(&mut self) {
        let discarded = self.log.len();
        self.log.clear();
        tracing::info!(discarded, "cleared conversation");
    }

    /// Routes a picked file: images join the pending input, anything else is
    /// appended right away as a user turn carrying the file.
    ///
    /// Read failures are logged and dropped.
    pub fn attach_file(&mut self, path: &Path) -> Option<AttachOutcome> {
        let selected = match load_selected_file(path) {
            Ok(selected) => selected,
            Err(error) => {
                tracing::warn!(error = %error, "ignoring unreadable file");
                return None;
            }
        };

        match selected {
            SelectedFile::Image(image) => {
                self.composer.add_image(image);
                Some(AttachOutcome::QueuedImage)
            }
            SelectedFile::Attachment(attachment) => {
                if self.is_awaiting_reply() {
                    tracing::warn!(
                        file = %attachment.name(),
                        "ignoring file attachment while a reply is pending"
                    );
                    return None;
                }
                let content = format!("📎 {}", attachment.name());
                let message = Message::new(Role::User, content).with_attachments(vec![attachment]);
                Some(AttachOutcome::Appended(self.log.push(message)))
            }
        }
    }

    /// Validates and applies the local half of a submission.
    ///
    /// Edits finish here. New turns are appended, the pending input is cleared
    /// and the in-flight slot is taken before the returned [`PendingTurn`]
    /// goes to the network.
    pub fn begin_submit(&mut self) -> Result<Submission, SubmitRejected> {
        if self.is_awaiting_reply() {
            tracing::warn!("submit ignored while a reply is pending");
            return Err(SubmitRejected::RequestInFlight);
        }
        if self.composer.is_empty() {
            return Err(SubmitRejected::EmptyInput);
        }

        let draft = self.composer.take_draft();
        if let Some(target) = draft.editing {
            return Ok(self.apply_edit(target, draft));
        }

        let Some(ticket) = InFlightTicket::acquire(&self.in_flight) else {
            return Err(SubmitRejected::RequestInFlight);
        };

        let history = self.log.to_provider_messages();
        let content = stored_content(&draft.text);
        let user_message_id = self
            .log
            .push(Message::user(content.clone(), draft.images.clone()));

        Ok(Submission::Pending(PendingTurn {
            user_message_id,
            question: draft.text,
            content,
            images: draft.images,
            search_enabled: draft.search_enabled,
            history,
            model: self.chat.active_model(),
            chat: self.chat.clone(),
            search: self.search.clone(),
            ticket,
        }))
    }

    fn apply_edit(&mut self, target: MessageId, draft: Draft) -> Submission {
        let Some(message) = self.log.get_mut(target) else {
            tracing::warn!(message_id = %target, "edit target no longer exists");
            return Submission::EditTargetMissing(target);
        };

        message.apply_edit(stored_content(&draft.text), draft.images);
        tracing::info!(message_id = %target, "edited message in place");
        Submission::Edited(target)
    }

    /// Appends the assistant turn for a finished request and frees the in-flight slot.
    ///
    /// Nothing is appended when the triggering user turn is no longer in the log.
    /// Failures become a visible assistant turn starting with [`ERROR_PREFIX`].
    pub fn finish_turn(&mut self, turn: CompletedTurn) -> SubmitOutcome {
        let CompletedTurn {
            user_message_id,
            reply,
            ticket,
        } = turn;

        if self.log.position(user_message_id).is_none() {
            tracing::info!(
                message_id = %user_message_id,
                "conversation cleared while awaiting reply, dropping it"
            );
            return SubmitOutcome::ReplyDiscarded(user_message_id);
        }

        let (content, failed) = match reply {
            Ok(text) => {
                tracing::info!(reply_len = text.len(), "assistant reply received");
                (text, false)
            }
            Err(error) => {
                tracing::error!(
                    error = %error,
                    stage = error.stage(),
                    kind = ?error.kind(),
                    "chat request failed"
                );
                (format!("{ERROR_PREFIX} {error}"), true)
            }
        };

        let assistant_message_id = self.log.push(Message::assistant(content));
        drop(ticket);

        SubmitOutcome::Replied {
            user_message_id,
            assistant_message_id,
            failed,
        }
    }

    /// Submits the pending input and waits for the reply.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, SubmitRejected> {
        match self.begin_submit()? {
            Submission::Edited(id) => Ok(SubmitOutcome::Edited(id)),
            Submission::EditTargetMissing(id) => Ok(SubmitOutcome::EditTargetMissing(id)),
            Submission::Pending(turn) => {
                let completed = turn.resolve().await;
                Ok(self.finish_turn(completed))
            }
        }
    }
}

fn stored_content(text: &str) -> String {
    if text.is_empty() {
        IMAGE_PLACEHOLDER.to_string()
    } else {
        text.to_string()
    }
}
