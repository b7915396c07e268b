// ABOUTME: Shared utility functions for CodingCat
// ABOUTME: ID and project-name generation, string truncation for logs

use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "brave", "calm", "clever", "cosmic", "curious", "fluffy", "gentle", "happy", "lazy", "lucky",
    "mellow", "nimble", "playful", "quiet", "sleepy", "sneaky", "sunny", "swift", "tiny", "witty",
];

const NOUNS: &[&str] = &[
    "cat", "kitten", "tabby", "whisker", "paw", "purr", "meow", "tiger", "lynx", "ocelot",
    "panther", "cougar", "bobcat", "calico", "mitten", "yarn", "nap", "pounce", "tail", "claw",
];

/// Generate an idempotency key for an inbound run event
pub fn generate_event_id() -> String {
    format!("run_{}", uuid::Uuid::new_v4().simple())
}

/// Generate a human-friendly project name such as `sleepy-tabby-4821`
pub fn generate_project_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("curious");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("cat");
    let suffix: u16 = rng.gen_range(1000..10000);
    format!("{}-{}-{}", adjective, noun, suffix)
}

/// Truncate a string to at most `max_chars` characters, adding an ellipsis if cut
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
