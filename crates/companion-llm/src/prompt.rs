use companion_types::models::{Companion, Message, Role};

/// System instruction for a companion: its instructions followed by the
/// persona settings that are filled in.
pub fn build_system_prompt(companion: &Companion) -> String {
    let mut prompt = companion.instructions.trim().to_string();

    let mut persona = vec![format!("Your name is {}.", companion.name.trim())];
    for (label, value) in [
        ("Personality", &companion.personality),
        ("Behavior", &companion.behavior),
        ("Response style", &companion.response_style),
    ] {
        let value = value.trim();
        if !value.is_empty() {
            persona.push(format!("{}: {}", label, value));
        }
    }

    if !prompt.is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str(&persona.join("\n"));
    prompt
}

/// Transcript prompt. `history` is oldest first and should end with the
/// user turn being answered; the prompt closes with an open cue for the
/// companion's reply.
pub fn build_prompt(companion_name: &str, history: &[Message]) -> String {
    let name = companion_name.trim();
    let mut lines: Vec<String> = history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "User",
                Role::Assistant => name,
            };
            format!("{}: {}", speaker, m.content.trim())
        })
        .collect();
    lines.push(format!("{}:", name));
    lines.join("\n")
}
