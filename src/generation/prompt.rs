//! Text prompt composition sent to the models.

const INSTRUMENTAL_SUFFIX: &str = ". Instrumental only, no vocals.";
const REMIX_PREFIX: &str = "Remix of: ";
const CONTINUATION_SUFFIX: &str =
    " Continuation of the previous section, maintain the same style and theme.";

/// `content`, then the style clause when a style is given, then the
/// instrumental clause when vocals are not wanted.
pub fn compose(content: &str, style: Option<&str>, has_vocals: bool) -> String {
    let mut prompt = content.to_string();
    if let Some(style) = style.filter(|s| !s.is_empty()) {
        prompt.push_str(" in the style of ");
        prompt.push_str(style);
    }
    if !has_vocals {
        prompt.push_str(INSTRUMENTAL_SUFFIX);
    }
    prompt
}

pub fn compose_remix(content: &str, style: Option<&str>, has_vocals: bool) -> String {
    format!("{}{}", REMIX_PREFIX, compose(content, style, has_vocals))
}

pub fn compose_extension(content: &str, style: Option<&str>, has_vocals: bool) -> String {
    let mut prompt = compose(content, style, has_vocals);
    prompt.push_str(CONTINUATION_SUFFIX);
    prompt
}
