use crate::error::PatchError;

/// Segmentos que nunca pueden aparecer en un puntero.
const FORBIDDEN_SEGMENTS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Parsea un puntero JSON a sus segmentos ya des-escapados.
///
/// Se separa por `/` antes de des-escapar (`~1` → `/`, luego `~0` → `~`), de
/// modo que `~01` produce `~1` y no `/`.
pub fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(PatchError::InvalidPointer { path: path.to_string(),
                                                reason: "must start with '/'".to_string() });
    };
    let mut segments = Vec::new();
    for raw in rest.split('/') {
        let segment = unescape(path, raw)?;
        if FORBIDDEN_SEGMENTS.contains(&segment.as_str()) {
            return Err(PatchError::ForbiddenSegment { path: path.to_string(),
                                                      segment });
        }
        segments.push(segment);
    }
    Ok(segments)
}

fn unescape(path: &str, raw: &str) -> Result<String, PatchError> {
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' && !matches!(chars.peek(), Some('0') | Some('1')) {
            return Err(PatchError::InvalidPointer { path: path.to_string(),
                                                    reason: format!("invalid escape in segment '{raw}'") });
        }
    }
    Ok(raw.replace("~1", "/").replace("~0", "~"))
}

/// Inversa de `unescape` para construir punteros.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Índice de array decimal sin ceros a la izquierda.
pub(crate) fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if segment.len() > 1 && segment.starts_with('0') {
        return None;
    }
    segment.parse().ok()
}
