use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

const FOOTER: &str = "Helpdesk - Sistema de Soporte Técnico";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plain-text alternative for an HTML body.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").trim().to_string()
}

fn layout(accent: &str, heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<style>
  body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
  .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
  .header {{ background-color: {accent}; color: white; padding: 20px; text-align: center; border-radius: 8px 8px 0 0; }}
  .content {{ background-color: #f9fafb; padding: 30px; border-radius: 0 0 8px 8px; }}
  .box {{ background-color: white; padding: 20px; border-left: 4px solid {accent}; margin: 20px 0; border-radius: 4px; }}
  .footer {{ text-align: center; margin-top: 20px; color: #6b7280; font-size: 14px; }}
</style>
</head>
<body>
<div class="container">
<div class="header"><h1>{heading}</h1></div>
<div class="content">
{body}
</div>
<div class="footer"><p>{FOOTER}</p></div>
</div>
</body>
</html>"#
    )
}

pub fn ticket_created(
    customer_name: &str,
    ticket_number: i64,
    subject: &str,
    description: Option<&str>,
) -> EmailContent {
    let body = format!(
        r#"<p>Hola <strong>{name}</strong>,</p>
<p>Tu ticket ha sido creado exitosamente. Nuestro equipo de soporte lo revisará pronto.</p>
<div class="box">
<h2>Ticket #{ticket_number}</h2>
<p><strong>Asunto:</strong> {subject}</p>
<p><strong>Descripción:</strong></p>
<p>{description}</p>
</div>
<p>Te notificaremos por email cuando haya actualizaciones en tu ticket.</p>"#,
        name = escape_html(customer_name),
        subject = escape_html(subject),
        description = escape_html(description.unwrap_or_default()),
    );

    EmailContent {
        subject: format!("Ticket #{ticket_number} creado - {subject}"),
        html: layout("#3b82f6", "Ticket Creado", &body),
    }
}

pub fn ticket_reply(
    customer_name: &str,
    ticket_number: i64,
    subject: &str,
    agent_name: &str,
    reply: &str,
) -> EmailContent {
    let body = format!(
        r#"<p>Hola <strong>{name}</strong>,</p>
<p>Has recibido una nueva respuesta en tu ticket <strong>#{ticket_number}</strong>.</p>
<div class="box">
<p><strong>{agent}</strong> respondió:</p>
<p>{reply}</p>
</div>
<p>Puedes responder directamente a este ticket desde tu portal de soporte.</p>"#,
        name = escape_html(customer_name),
        agent = escape_html(agent_name),
        reply = escape_html(reply),
    );

    EmailContent {
        subject: format!("Re: Ticket #{ticket_number} - {subject}"),
        html: layout("#10b981", "Nueva Respuesta en tu Ticket", &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_subject_and_escaping() {
        let email = ticket_created("Ana <script>", 1007, "Login fails", Some("a & b"));
        assert_eq!(email.subject, "Ticket #1007 creado - Login fails");
        assert!(email.html.contains("Ana &lt;script&gt;"));
        assert!(email.html.contains("a &amp; b"));
        assert!(!email.html.contains("<script>"));
    }

    #[test]
    fn test_reply_subject() {
        let email = ticket_reply("Ana", 12, "Printer", "Bob", "Try restarting");
        assert_eq!(email.subject, "Re: Ticket #12 - Printer");
        assert!(email.html.contains("<strong>Bob</strong> respondió"));
        assert!(email.html.contains("Try restarting"));
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hola <b>Ana</b></p>"), "Hola Ana");
    }
}
