//! services/api/src/adapters/generator.rs
//!
//! This module contains the adapters for the card-generating LLM.
//! They implement the `FlashcardGenerator` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use flashcards_core::{
    domain::{GeneratedCard, GenerationInput, GenerationRequest},
    ports::{FlashcardGenerator, PortError, PortResult},
};
use serde::Deserialize;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a flashcard generation expert. Respond ONLY with a JSON \
     array of objects shaped like {\"front\": \"term\", \"back\": \"definition\"}.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `FlashcardGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiFlashcardGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiFlashcardGenerator {
    /// Creates a new `OpenAiFlashcardGenerator`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn user_prompt(request: &GenerationRequest) -> String {
    match request.input {
        GenerationInput::Text => format!(
            "Extract flashcard content from the text below. Create 3-10 flashcard pairs.\n\nText:\n{}",
            request.content
        ),
        GenerationInput::Topic => format!(
            "Create 10 educational flashcards about: {}",
            request.content
        ),
    }
}

#[derive(Deserialize)]
struct CardJson {
    front: String,
    back: String,
}

/// Parses the model's reply, tolerating a surrounding markdown code fence.
fn parse_cards(reply: &str) -> PortResult<Vec<GeneratedCard>> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    let cards: Vec<CardJson> = serde_json::from_str(body).map_err(|e| {
        debug!("Unparseable generator reply: {}", reply);
        PortError::Unexpected(format!("generator reply is not a card list: {}", e))
    })?;
    Ok(cards
        .into_iter()
        .map(|c| GeneratedCard {
            front: c.front.trim().to_string(),
            back: c.back.trim().to_string(),
        })
        .collect())
}

//=========================================================================================
// `FlashcardGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl FlashcardGenerator for OpenAiFlashcardGenerator {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<Vec<GeneratedCard>> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt(request))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unavailable(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Generator response contained no text content.".to_string())
            })?;
        parse_cards(&content)
    }
}

/// Stands in when no API key is configured; every request is `Unavailable`.
pub struct DisabledGenerator;

#[async_trait]
impl FlashcardGenerator for DisabledGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> PortResult<Vec<GeneratedCard>> {
        Err(PortError::Unavailable(
            "card generation is not configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_parse_with_or_without_a_fence() {
        let plain = r#"[{"front": "mitosis", "back": "cell division"}]"#;
        let fenced = "```json\n[{\"front\": \" atp \", \"back\": \"energy\"}]\n```";
        assert_eq!(
            parse_cards(plain).unwrap(),
            vec![GeneratedCard {
                front: "mitosis".to_string(),
                back: "cell division".to_string(),
            }]
        );
        assert_eq!(parse_cards(fenced).unwrap()[0].front, "atp");
        assert!(matches!(
            parse_cards("Sure! Here are your cards."),
            Err(PortError::Unexpected(_))
        ));
    }

    #[test]
    fn prompts_depend_on_the_input_kind() {
        let text = GenerationRequest {
            input: GenerationInput::Text,
            content: "The cell is the unit of life.".to_string(),
        };
        let topic = GenerationRequest {
            input: GenerationInput::Topic,
            content: "photosynthesis".to_string(),
        };
        assert!(user_prompt(&text).contains("Extract flashcard content"));
        assert!(user_prompt(&topic).ends_with("photosynthesis"));
    }

    #[tokio::test]
    async fn disabled_generator_reports_unavailable() {
        let request = GenerationRequest {
            input: GenerationInput::Topic,
            content: "cells".to_string(),
        };
        assert!(matches!(
            DisabledGenerator.generate(&request).await,
            Err(PortError::Unavailable(_))
        ));
    }
}
