use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const NATURAL_LANGUAGE_PROMPT: &str = "Describe this image in one concise paragraph, starting immediately with the primary subject (e.g., 'Watch,' 'Landscape,' 'Person'). Focus on key elements, their relationships, and notable details. Be specific and direct, avoiding any introductory phrases like 'The image shows' or 'I can see.' Prioritize the most important aspects and describe them factually. Identify the main subject quickly and accurately, noting its dominant characteristics such as size, color, shape, or position. For multiple elements, describe their spatial relationships. Include relevant details about composition, color schemes, lighting, and textures. Mention any actions, movements, functions, or unique features of objects, and appearances or behaviors of people or animals. Include any visible text, logos, or recognizable symbols. Describe what you see literally, without interpreting the image's style (e.g., don't use terms like 'stylized,' 'illustration,' or mention artistic techniques). Treat every subject as a real object or scene, not as a representation. Use varied and precise vocabulary to create a vivid description while maintaining a neutral tone. Avoid subjective interpretations unless crucial to understanding the image's content.";

const BOORU_TAGS_PROMPT: &str = "Generate a list of tags for this image in the style of Booru image boards and SDXL prompts. Focus on describing the visual elements, subjects, objects, settings, colors, lighting, composition, artistic style, and other relevant attributes. Format the output as a comma-separated list of tags without numbering or bullet points. Be specific and detailed, but keep each tag concise (1-3 words typically). Include tags for the main subject, background elements, colors, lighting, composition, style, medium, and any notable features. Do not include explanatory text or categorization headers - just provide the raw comma-separated tag list. Make sure to include mostly single-word tags, you can use some double-word tags if needed but mostly single word if possible.";

/// Which fixed instruction template is sent with the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptStyle {
    #[default]
    NaturalLanguage,
    BooruTags,
}

impl PromptStyle {
    pub fn all() -> &'static [PromptStyle] {
        &[PromptStyle::NaturalLanguage, PromptStyle::BooruTags]
    }

    pub fn label(&self) -> &'static str {
        match self {
            PromptStyle::NaturalLanguage => "FLUX (Natural Language)",
            PromptStyle::BooruTags => "SDXL (Booru Tags)",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            PromptStyle::NaturalLanguage => NATURAL_LANGUAGE_PROMPT,
            PromptStyle::BooruTags => BOORU_TAGS_PROMPT,
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PromptStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        match lowered.as_str() {
            "natural" | "natural-language" | "flux" | "flux (natural language)" => {
                Ok(PromptStyle::NaturalLanguage)
            }
            "booru" | "booru-tags" | "tags" | "sdxl" | "sdxl (booru tags)" => {
                Ok(PromptStyle::BooruTags)
            }
            _ => Err(format!(
                "Unknown prompt style '{}'. Use 'natural' or 'booru'.",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_and_display_names() {
        assert_eq!("booru".parse::<PromptStyle>(), Ok(PromptStyle::BooruTags));
        assert_eq!(
            "FLUX (Natural Language)".parse::<PromptStyle>(),
            Ok(PromptStyle::NaturalLanguage)
        );
        assert!("haiku".parse::<PromptStyle>().is_err());
    }

    #[test]
    fn templates_are_distinct() {
        assert!(PromptStyle::NaturalLanguage.template().starts_with("Describe this image"));
        assert!(PromptStyle::BooruTags.template().starts_with("Generate a list of tags"));
        assert_eq!(PromptStyle::BooruTags.to_string(), "SDXL (Booru Tags)");
    }
}
