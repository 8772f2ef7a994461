use rand::Rng;

/// Placeholder substituted with the recipient's user id.
pub const RECIPIENT_PLACEHOLDER: &str = "{to}";

/// Used when a template lookup lands outside the bank.
pub const FALLBACK_GREETING: &str = "Hello!";

/// Fixed, ordered bank of chat lines. Never mutated at runtime.
pub const MESSAGE_TEMPLATES: &[&str] = &[
    "Hey {to}! How are you doing?",
    "Hi {to}! I'm doing great, thanks for asking!",
    "Just working on this cool NoSQL project with MongoDB.",
    "That sounds interesting! What are you building?",
    "It's a messaging API. Pretty fun actually!",
    "Nice! Are you using Docker for deployment?",
    "Yes! I have everything running in Docker containers.",
    "That's awesome! Docker makes everything so much easier.",
    "Definitely! Want to grab coffee later?",
    "Sure! I'd love to. How about 3 PM?",
    "Perfect! See you then!",
    "See you!",
    "What's up?",
    "Not much, just coding. You?",
    "Same here! Working on a new feature.",
    "Cool! Let me know if you need help.",
    "Thanks! I appreciate it.",
    "No problem!",
    "Have you tried the new API yet?",
    "Yeah, it's really fast!",
];

pub fn template_at(index: usize) -> &'static str {
    MESSAGE_TEMPLATES
        .get(index)
        .copied()
        .unwrap_or(FALLBACK_GREETING)
}

/// Draw a template uniformly at random.
pub fn pick_template<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    template_at(rng.gen_range(0..MESSAGE_TEMPLATES.len()))
}

/// Substitute the first recipient placeholder, if any.
pub fn render(template: &str, to: &str) -> String {
    template.replacen(RECIPIENT_PLACEHOLDER, to, 1)
}
