//! Text helpers for node names and links.

use std::sync::OnceLock;

use regex::Regex;

struct SlugPatterns {
    quotes: Regex,
    at: Regex,
    and: Regex,
    other: Regex,
    underscores: Regex,
    edges: Regex,
}

fn patterns() -> &'static SlugPatterns {
    static PATTERNS: OnceLock<SlugPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SlugPatterns {
        quotes: Regex::new(r"['`]").expect("quote pattern"),
        at: Regex::new(r"\s*@\s*").expect("at pattern"),
        and: Regex::new(r"\s*&\s*").expect("ampersand pattern"),
        other: Regex::new(r"\s*[^A-Za-z0-9.\-]\s*").expect("separator pattern"),
        underscores: Regex::new(r"_+").expect("underscore pattern"),
        edges: Regex::new(r"^[_.]+|[_.]+$").expect("edge pattern"),
    })
}

/// URL-safe identifier for a node name.
///
/// `"Tom & Jerry's @ Home"` becomes `"tom_and_jerrys_at_home"`.
pub fn slugify(name: &str) -> String {
    let p = patterns();
    let slug = name.trim().to_lowercase();
    let slug = p.quotes.replace_all(&slug, "");
    let slug = p.at.replace_all(&slug, " at ");
    let slug = p.and.replace_all(&slug, " and ");
    let slug = p.other.replace_all(&slug, "_");
    let slug = p.underscores.replace_all(&slug, "_");
    p.edges.replace_all(&slug, "").into_owned()
}

/// Embed markup for a node video. Only YouTube links are embedded.
pub fn video_embed(url: Option<&str>) -> String {
    match url {
        Some(url) if url.contains("youtube") => {
            let id = url.split("watch?v=").nth(1).unwrap_or_default();
            format!(
                "<iframe width='560' height='315' src='https://www.youtube.com/embed/{}' frameborder='0' allowfullscreen></iframe>",
                id
            )
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("New Circle Movement", "new_circle_movement")]
    #[case("  Tom & Jerry's @ Home  ", "tom_and_jerrys_at_home")]
    #[case("__v1.2-beta..", "v1.2-beta")]
    #[case("a   b!!c", "a_b_c")]
    #[case("!!!", "")]
    fn test_slugify(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[rstest]
    #[case(Some("https://www.youtube.com/watch?v=AiZFoxjQFcI"), "AiZFoxjQFcI")]
    #[case(Some("https://youtube.com/channel/x"), "")]
    fn test_video_embed_youtube(#[case] url: Option<&str>, #[case] id: &str) {
        let embed = video_embed(url);
        assert!(embed.starts_with("<iframe"));
        assert!(embed.contains(&format!("embed/{}'", id)));
    }

    #[rstest]
    #[case(None)]
    #[case(Some("https://vimeo.com/123"))]
    fn test_video_embed_other(#[case] url: Option<&str>) {
        assert_eq!(video_embed(url), "");
    }

    proptest! {
        #[test]
        fn slugify_is_idempotent(name in "\\PC{0,40}") {
            let once = slugify(&name);
            prop_assert_eq!(slugify(&once), once.clone());
        }

        #[test]
        fn slug_has_only_safe_characters(name in "\\PC{0,40}") {
            let slug = slugify(&name);
            prop_assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c)));
            prop_assert!(!slug.starts_with('_') && !slug.ends_with('_'));
        }
    }
}
