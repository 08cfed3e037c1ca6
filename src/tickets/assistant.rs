//! AI help for agents working a ticket.
//!
//! The assistant reads the whole thread, asks the configured
//! [`LLMProvider`] for a suggestion and files the answer as an internal
//! note authored by the agent who asked.

use log::{error, info, warn};
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

use super::messages::{MessageThread, PostMessage};
use super::types::{AssistResponse, MessageView};
use crate::core::shared::error::HelpdeskError;
use crate::core::shared::models::{MessageType, Ticket};
use crate::core::shared::storage::HelpdeskStore;
use crate::llm::LLMProvider;
use crate::security::{require_permission, Caller, Permission};

pub const DEFAULT_TRIGGER: &str = "@ia";
pub const REPLY_PREFIX: &str = "🤖 **Asistente IA**:\n\n";

const SYSTEM_PROMPT: &str = "Eres un asistente virtual de soporte técnico especializado en ayudar a los agentes de atención al cliente.
Tu tarea es analizar el contexto completo del ticket de soporte y proporcionar respuestas útiles, profesionales y precisas.

Cuando te pidan ayuda:
1. Analiza todo el historial de mensajes del ticket
2. Identifica el problema principal y el estado actual
3. Proporciona respuestas claras y accionables
4. Sugiere pasos o soluciones específicas cuando sea apropiado
5. Mantén un tono profesional pero amigable
6. Si hay información técnica, explícala de manera comprensible

Tu respuesta será visible para el agente, quien puede usarla como borrador o guía para responder al cliente.";

/// Renders the ticket and its thread as the prompt handed to the model.
pub fn build_transcript(
    ticket: &Ticket,
    customer_name: &str,
    thread: &[MessageView],
    agent_message: &str,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Información del Ticket:");
    let _ = writeln!(out, "- Número: #{}", ticket.number);
    let _ = writeln!(out, "- Asunto: {}", ticket.subject);
    let _ = writeln!(
        out,
        "- Descripción inicial: {}",
        ticket.description.as_deref().unwrap_or("")
    );
    let _ = writeln!(out, "- Prioridad: {}", ticket.priority);
    let _ = writeln!(out, "- Estado: {}", ticket.status);
    let _ = writeln!(out, "- Cliente: {customer_name}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Historial de mensajes:");

    for (index, message) in thread.iter().enumerate() {
        let (author, role) = match &message.author {
            Some(a) => (
                a.name.clone().unwrap_or_else(|| a.email.clone()),
                a.role.as_str(),
            ),
            None => ("Usuario eliminado".to_string(), "-"),
        };
        let _ = writeln!(
            out,
            "{}. [{author}] ({role}) - {}:",
            index + 1,
            message.created_at.format("%d/%m/%Y %H:%M:%S")
        );
        let _ = writeln!(out, "{}", message.content);
        if message.is_internal {
            let _ = writeln!(out, "(Nota interna)");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Nuevo mensaje del agente:");
    out.push_str(agent_message.trim());
    out
}

#[derive(Clone)]
pub struct TicketAssistant {
    provider: Arc<dyn LLMProvider>,
    store: Arc<dyn HelpdeskStore>,
    messages: MessageThread,
    trigger: String,
}

impl std::fmt::Debug for TicketAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketAssistant")
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl TicketAssistant {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        store: Arc<dyn HelpdeskStore>,
        messages: MessageThread,
        trigger: impl Into<String>,
    ) -> Self {
        let trigger = trigger.into().trim().to_lowercase();
        Self {
            provider,
            store,
            messages,
            trigger: if trigger.is_empty() {
                DEFAULT_TRIGGER.to_string()
            } else {
                trigger
            },
        }
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn is_triggered_by(&self, content: &str) -> bool {
        content.to_lowercase().contains(&self.trigger)
    }

    pub async fn assist(
        &self,
        caller: Option<&Caller>,
        ticket_id: Uuid,
        agent_message: &str,
    ) -> Result<AssistResponse, HelpdeskError> {
        let caller = require_permission(caller, Permission::UseAssistant)?;
        if agent_message.trim().is_empty() {
            return Err(HelpdeskError::validation("userMessage is required"));
        }

        let ticket = self
            .store
            .find_ticket(ticket_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("Ticket not found"))?;
        let customer_name = self
            .store
            .find_user(ticket.customer_id)
            .await?
            .map(|c| c.display_name().to_string())
            .unwrap_or_default();
        let thread = self.messages.thread_for(caller, ticket.id).await?;

        let prompt = build_transcript(&ticket, &customer_name, &thread, agent_message);
        let reply = self
            .provider
            .generate(&prompt, &json!({ "system": SYSTEM_PROMPT }))
            .await
            .map_err(|e| {
                error!("Assistant request for ticket #{} failed: {e}", ticket.number);
                HelpdeskError::Internal("AI assistant request failed".to_string())
            })?;

        let message = self
            .messages
            .post(
                Some(caller),
                PostMessage::comment(ticket.id, format!("{REPLY_PREFIX}{reply}")).internal(),
            )
            .await?;
        info!("Assistant answered on ticket #{} for {}", ticket.number, caller.email);

        Ok(AssistResponse {
            success: true,
            message,
            ai_response: reply,
        })
    }

    /// Runs after a message has been stored. Staff comments mentioning the
    /// trigger get an assistant reply; failures never reach the poster.
    pub async fn on_message_posted(&self, caller: &Caller, posted: &MessageView) -> Option<AssistResponse> {
        if !caller.has_permission(Permission::UseAssistant)
            || posted.message_type != MessageType::Comment
            || posted.content.starts_with(REPLY_PREFIX)
            || !self.is_triggered_by(&posted.content)
        {
            return None;
        }

        match self.assist(Some(caller), posted.ticket_id, &posted.content).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Assistant mention on ticket {} failed: {e}", posted.ticket_id);
                None
            }
        }
    }
}
