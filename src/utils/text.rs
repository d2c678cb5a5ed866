/// Collapses runs of whitespace, replaces control characters and normalizes
/// curly quotes. Scraped text fragments arrive with whatever layout noise the
/// site's markup carried.
pub fn clean_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            // A control char separates tokens; deleting it would glue them.
            c if c.is_control() => ' ',
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
