//! Small helpers for the line syntax shared by the card corpus and every
//! template: `code ; tag`.

/// Split a line at the first `;` outside a string literal.
/// Returns the code part and the trimmed comment, if any.
pub(crate) fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut in_string = false;
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            ';' if !in_string => return (&line[..i], Some(line[i + 1..].trim())),
            _ => {}
        }
    }
    (line, None)
}

/// Everything after the mnemonic: `db CHARMANDER` -> `CHARMANDER`.
pub(crate) fn operand(code: &str) -> &str {
    let code = code.trim();
    match code.split_once(char::is_whitespace) {
        Some((_, rest)) => rest.trim(),
        None => "",
    }
}

/// Label of a card record start line such as `CharmanderCard: ; CARD_NAME`.
pub(crate) fn card_label(line: &str) -> Option<&str> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    let (code, _) = split_comment(line);
    let label = code.trim_end().strip_suffix(':')?;
    if label.len() > "Card".len()
        && label.ends_with("Card")
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Some(label)
    } else {
        None
    }
}

/// Comma separated tokens of an `energy` operand.
pub(crate) fn energy_tokens(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Color and count pairs of an `energy` operand. A bare count such as
/// `energy 0` carries no pairs.
pub(crate) fn energy_pairs(value: &str) -> std::result::Result<Vec<(&str, u32)>, String> {
    let mut pairs = Vec::new();
    for pair in energy_tokens(value).chunks(2) {
        if let [color, count] = pair {
            if color.parse::<u32>().is_ok() {
                continue;
            }
            let count = count
                .parse::<u32>()
                .map_err(|_| format!("bad energy count '{}'", count))?;
            pairs.push((*color, count));
        }
    }
    Ok(pairs)
}

pub(crate) fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

/// The line with its comment removed, or `None` when nothing but
/// whitespace is left.
pub(crate) fn code_without_comment(line: &str) -> Option<&str> {
    let (code, _) = split_comment(line);
    let code = code.trim_end();
    if code.trim().is_empty() {
        None
    } else {
        Some(code)
    }
}
