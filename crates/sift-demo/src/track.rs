//! Word tracking helpers

use serde_json::{Map, Value};
use siftstream::{ConsumerHandle, EventHandler, HandlerResult};

/// Build a definition matching twitter interactions containing any of
/// `words`
///
/// Returns `None` when no non-blank word is given.
pub fn track_csdl<S: AsRef<str>>(words: &[S]) -> Option<String> {
    let clauses: Vec<String> = words
        .iter()
        .map(|w| w.as_ref().trim())
        .filter(|w| !w.is_empty())
        .map(|w| format!("interaction.content contains \"{}\"", escape(w)))
        .collect();

    if clauses.is_empty() {
        return None;
    }
    Some(format!(
        "interaction.type == \"twitter\" and ({})",
        clauses.join(" or ")
    ))
}

fn escape(word: &str) -> String {
    word.replace('\\', "\\\\").replace('"', "\\\"")
}

fn field<'a>(interaction: &'a Value, name: &str) -> Option<&'a Value> {
    interaction.get("interaction")?.get(name)
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "unknown".to_string(),
    }
}

/// One-line summary of an interaction
pub fn describe_interaction(interaction: &Value) -> String {
    match field(interaction, "content").and_then(Value::as_str) {
        Some(content) => content.to_string(),
        None => format!(
            "{} interaction with no content",
            text(field(interaction, "type"))
        ),
    }
}

/// One-line summary of a deletion notice
pub fn describe_deletion(interaction: &Value) -> String {
    format!(
        "Delete request for interaction {} of type {}. Please delete it from your archive.",
        text(field(interaction, "id")),
        text(field(interaction, "type"))
    )
}

/// Handler printing every event to stdout
#[derive(Debug, Default)]
pub struct PrintingHandler {
    interactions: u64,
    deletions: u64,
}

impl PrintingHandler {
    /// Create a handler with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventHandler for PrintingHandler {
    fn on_connect(&mut self, consumer: &ConsumerHandle) -> HandlerResult {
        println!("Connected to {}", consumer.hashes());
        println!("--");
        Ok(())
    }

    fn on_interaction(
        &mut self,
        _consumer: &ConsumerHandle,
        interaction: Value,
        hash: &str,
    ) -> HandlerResult {
        self.interactions += 1;
        println!("[{hash}] {}", describe_interaction(&interaction));
        println!("--");
        Ok(())
    }

    fn on_deleted(
        &mut self,
        _consumer: &ConsumerHandle,
        interaction: Value,
        _hash: &str,
    ) -> HandlerResult {
        self.deletions += 1;
        println!("{}", describe_deletion(&interaction));
        println!("--");
        Ok(())
    }

    fn on_warning(&mut self, _consumer: &ConsumerHandle, message: &str) -> HandlerResult {
        println!("WARN: {message}");
        println!("--");
        Ok(())
    }

    fn on_error(&mut self, _consumer: &ConsumerHandle, message: &str) -> HandlerResult {
        println!("ERR: {message}");
        println!("--");
        Ok(())
    }

    fn on_status(
        &mut self,
        _consumer: &ConsumerHandle,
        status: &str,
        _data: Map<String, Value>,
    ) -> HandlerResult {
        tracing::debug!(status, "status message");
        Ok(())
    }

    fn on_disconnect(&mut self, _consumer: &ConsumerHandle) -> HandlerResult {
        println!(
            "Disconnected after {} interactions and {} deletions",
            self.interactions, self.deletions
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_csdl() {
        assert_eq!(
            track_csdl(&["rust", "tokio"]).unwrap(),
            "interaction.type == \"twitter\" and (interaction.content contains \"rust\" or interaction.content contains \"tokio\")"
        );
    }

    #[test]
    fn test_track_csdl_escapes_quotes() {
        let csdl = track_csdl(&["say \"hi\""]).unwrap();
        assert!(csdl.contains(r#"contains "say \"hi\"""#));
    }

    #[test]
    fn test_track_csdl_requires_words() {
        assert_eq!(track_csdl::<&str>(&[]), None);
        assert_eq!(track_csdl(&["  ", ""]), None);
    }

    #[test]
    fn test_describe_interaction() {
        let with_content = json!({"interaction": {"content": "hello", "type": "twitter"}});
        assert_eq!(describe_interaction(&with_content), "hello");

        let without = json!({"interaction": {"type": "facebook"}});
        assert_eq!(
            describe_interaction(&without),
            "facebook interaction with no content"
        );
    }

    #[test]
    fn test_describe_deletion() {
        let deleted = json!({"interaction": {"id": "1e1", "type": "twitter"}, "deleted": true});
        assert_eq!(
            describe_deletion(&deleted),
            "Delete request for interaction 1e1 of type twitter. Please delete it from your archive."
        );
    }
}
