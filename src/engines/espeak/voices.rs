use crate::VoiceDescriptor;

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 2)
/// ```
///
/// Voice names use `_` for spaces; they are restored so that labels like
/// `"Spanish - Female"` can match `Spanish (Spain)`.
pub fn parse_voice_table(table: &str) -> Vec<VoiceDescriptor> {
    table
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(parse_voice_line)
        .collect()
}

fn parse_voice_line(line: &str) -> Option<VoiceDescriptor> {
    let mut columns = line.split_whitespace();
    let _priority = columns.next()?;
    let language = columns.next()?;
    let _age_gender = columns.next()?;
    let name = columns.next()?;
    Some(VoiceDescriptor {
        id: language.to_string(),
        name: name.replace('_', " "),
        language: language.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::resolve_voice;

    const TABLE: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  de              --/M      German             gmw/de
 2  en-gb           --/M      English_(Great_Britain) gmw/en            (en 2)
 5  en-us           --/M      English_(America)  gmw/en-US            (en 3)
 5  es              --/M      Spanish_(Spain)    roa/es
";

    #[test]
    fn parses_every_row_after_header() {
        let voices = parse_voice_table(TABLE);
        assert_eq!(voices.len(), 5);
        assert_eq!(voices[3].id, "en-us");
        assert_eq!(voices[3].name, "English (America)");
    }

    #[test]
    fn ui_labels_match_restored_names() {
        let voices = parse_voice_table(TABLE);
        let spanish = resolve_voice(&voices, "Spanish - Female").map(|v| v.id.as_str());
        assert_eq!(spanish, Some("es"));
        let german = resolve_voice(&voices, "German - Female").map(|v| v.id.as_str());
        assert_eq!(german, Some("de"));
    }

    #[test]
    fn ignores_output_without_header() {
        assert!(parse_voice_table("").is_empty());
        assert!(parse_voice_table("espeak-ng: error").is_empty());
    }
}
