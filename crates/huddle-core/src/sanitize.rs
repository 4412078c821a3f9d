/// Characters stripped from relayed chat text. Removing (rather than
/// entity-escaping) keeps sanitization idempotent and lets markup-only
/// messages collapse to the empty string, which the relay then drops.
const STRIPPED: &[char] = &['<', '>', '&', '"', '\'', '`', '/', '\\'];

pub fn sanitize_message(input: &str) -> String {
    let filtered: String = input.chars().filter(|c| !STRIPPED.contains(c)).collect();
    filtered.trim().to_string()
}
