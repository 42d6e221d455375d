//! Separación de un script SQL en sentencias de nivel superior.
//!
//! Un `;` sólo termina la sentencia fuera de comillas simples/dobles, cuerpos
//! `$tag$ ... $tag$` y comentarios (`--` y `/* */`, anidables).

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Normal,
    Single,
    Double,
    Dollar(String),
    Line,
    Block(usize),
}

pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut mode = Mode::Normal;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match &mode {
            Mode::Normal => match c {
                ';' => {
                    if has_code {
                        out.push(current.trim().to_string());
                    }
                    current.clear();
                    has_code = false;
                    i += 1;
                    continue;
                }
                '\'' => {
                    mode = Mode::Single;
                    has_code = true;
                }
                '"' => {
                    mode = Mode::Double;
                    has_code = true;
                }
                '-' if next == Some('-') => {
                    mode = Mode::Line;
                    current.push_str("--");
                    i += 2;
                    continue;
                }
                '/' if next == Some('*') => {
                    mode = Mode::Block(1);
                    current.push_str("/*");
                    i += 2;
                    continue;
                }
                '$' => {
                    if let Some(tag) = dollar_tag(&chars, i) {
                        current.push_str(&tag);
                        i += tag.chars().count();
                        mode = Mode::Dollar(tag);
                        has_code = true;
                        continue;
                    }
                    has_code = true;
                }
                c if !c.is_whitespace() => has_code = true,
                _ => {}
            },
            Mode::Single => {
                if c == '\'' {
                    if next == Some('\'') {
                        current.push_str("''");
                        i += 2;
                        continue;
                    }
                    mode = Mode::Normal;
                }
            }
            Mode::Double => {
                if c == '"' {
                    if next == Some('"') {
                        current.push_str("\"\"");
                        i += 2;
                        continue;
                    }
                    mode = Mode::Normal;
                }
            }
            Mode::Dollar(tag) => {
                if c == '$' && starts_with_at(&chars, i, tag) {
                    current.push_str(tag);
                    i += tag.chars().count();
                    mode = Mode::Normal;
                    continue;
                }
            }
            Mode::Line => {
                if c == '\n' {
                    mode = Mode::Normal;
                }
            }
            Mode::Block(depth) => {
                let depth = *depth;
                if c == '*' && next == Some('/') {
                    current.push_str("*/");
                    i += 2;
                    mode = if depth == 1 { Mode::Normal } else { Mode::Block(depth - 1) };
                    continue;
                }
                if c == '/' && next == Some('*') {
                    current.push_str("/*");
                    i += 2;
                    mode = Mode::Block(depth + 1);
                    continue;
                }
            }
        }
        current.push(c);
        i += 1;
    }
    if has_code {
        out.push(current.trim().to_string());
    }
    out
}

/// `$tag$` válido que empieza en `i` (tag vacío o identificador).
fn dollar_tag(chars: &[char], i: usize) -> Option<String> {
    let mut j = i + 1;
    while j < chars.len() {
        let c = chars[j];
        if c == '$' {
            return Some(chars[i..=j].iter().collect());
        }
        let valid = if j == i + 1 { c.is_alphabetic() || c == '_' } else { c.is_alphanumeric() || c == '_' };
        if !valid {
            return None;
        }
        j += 1;
    }
    None
}

fn starts_with_at(chars: &[char], i: usize, tag: &str) -> bool {
    let tag: Vec<char> = tag.chars().collect();
    chars.len() >= i + tag.len() && chars[i..i + tag.len()] == tag[..]
}

/// ¿La sentencia devuelve filas?
pub fn returns_rows(statement: &str) -> bool {
    matches!(first_keyword(statement).as_deref(),
             Some("SELECT") | Some("WITH") | Some("VALUES") | Some("TABLE"))
}

/// Control transaccional de nivel superior (BEGIN/COMMIT/ROLLBACK/...).
pub fn is_transaction_control(statement: &str) -> bool {
    matches!(first_keyword(statement).as_deref(),
             Some("BEGIN") | Some("START") | Some("COMMIT") | Some("END") | Some("ROLLBACK") | Some("SAVEPOINT")
             | Some("RELEASE"))
}

/// Primera palabra clave, ignorando comentarios iniciales.
pub fn first_keyword(statement: &str) -> Option<String> {
    let mut rest = statement.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, r)| r).unwrap_or("").trim_start();
        } else {
            break;
        }
    }
    let word: String = rest.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if word.is_empty() {
        None
    } else {
        Some(word.to_ascii_uppercase())
    }
}
