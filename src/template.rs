//! Rendering of decoded templates.
//!
//! Templates use the `{}` placeholder language of the tracing runtime:
//! `{}` or `{N}` fields with an optional `:spec` after the field name, `{{`
//! and `}}` for literal braces. Only integer presentation is supported since
//! every argument on an encoded log line is an integer.

use std::fmt::Write as _;

use crate::error::TemplateError;

const ESC: char = '\x1b';

/// Widest field a format spec may request.
const MAX_WIDTH: usize = u16::MAX as usize;

/// What to do with `[:N]` / `[]` colour marks in decoded messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Leave marks in the text untouched.
    #[default]
    Keep,
    /// Render marks as ANSI SGR sequences.
    Ansi,
    /// Remove marks.
    Strip,
}

/// Substitutes `args` positionally into `template`.
///
/// Every placeholder needs an argument and every argument must be used.
///
/// # Arguments
///
/// * `template` - Message text with `{}` / `{N}` / `{:spec}` placeholders
/// * `args` - Integers decoded from the log line, in order
///
/// # Examples
///
/// ```
/// # use hash_trace::template::substitute;
/// assert_eq!(substitute("value={}", &[42]).unwrap(), "value=42");
/// assert_eq!(substitute("{:#x} at {:>4}", &[255, 7]).unwrap(), "0xff at    7");
///
/// // Argument count must match the placeholders
/// assert!(substitute("value={}", &[1, 2]).is_err());
/// ```
pub fn substitute(template: &str, args: &[i128]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + args.len() * 4);
    let mut used = vec![false; args.len()];
    let mut next_auto = 0usize;
    let mut manual = false;

    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'{' if bytes.get(pos + 1) == Some(&b'{') => {
                out.push_str(&template[literal_start..=pos]);
                pos += 2;
                literal_start = pos;
            }
            b'}' if bytes.get(pos + 1) == Some(&b'}') => {
                out.push_str(&template[literal_start..=pos]);
                pos += 2;
                literal_start = pos;
            }
            b'}' => return Err(TemplateError::SingleClosingBrace(pos)),
            b'{' => {
                out.push_str(&template[literal_start..pos]);
                let close = template[pos..]
                    .find('}')
                    .map(|offset| pos + offset)
                    .ok_or(TemplateError::UnclosedBrace(pos))?;
                let field = &template[pos + 1..close];
                let (name, spec) = field.split_once(':').unwrap_or((field, ""));

                let index = if name.is_empty() {
                    if manual {
                        return Err(TemplateError::MixedNumbering);
                    }
                    next_auto += 1;
                    next_auto - 1
                } else {
                    if next_auto > 0 {
                        return Err(TemplateError::MixedNumbering);
                    }
                    manual = true;
                    name.parse::<usize>()
                        .map_err(|_| TemplateError::InvalidField(name.to_string()))?
                };

                let value = *args.get(index).ok_or(TemplateError::MissingArgument {
                    index,
                    supplied: args.len(),
                })?;
                used[index] = true;
                FormatSpec::parse(spec)?.render(value, &mut out)?;

                pos = close + 1;
                literal_start = pos;
            }
            _ => pos += 1,
        }
    }
    out.push_str(&template[literal_start..]);

    let consumed = used.iter().filter(|&&u| u).count();
    if consumed < args.len() {
        return Err(TemplateError::UnusedArguments {
            consumed,
            supplied: args.len(),
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Minus,
    Plus,
    Space,
}

/// Parsed `[[fill]align][sign][#][0][width][type]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FormatSpec {
    fill: char,
    align: Option<Align>,
    sign: Sign,
    alternate: bool,
    width: usize,
    kind: char,
}

impl FormatSpec {
    fn parse(spec: &str) -> Result<Self, TemplateError> {
        let unsupported = || TemplateError::UnsupportedSpec(spec.to_string());
        let mut parsed = FormatSpec {
            fill: ' ',
            align: None,
            sign: Sign::Minus,
            alternate: false,
            width: 0,
            kind: 'd',
        };
        let chars: Vec<char> = spec.chars().collect();
        let mut i = 0;

        if chars.len() >= 2 && align_of(chars[1]).is_some() {
            parsed.fill = chars[0];
            parsed.align = align_of(chars[1]);
            i = 2;
        } else if let Some(align) = chars.first().and_then(|&c| align_of(c)) {
            parsed.align = Some(align);
            i = 1;
        }

        match chars.get(i) {
            Some('+') => {
                parsed.sign = Sign::Plus;
                i += 1;
            }
            Some('-') => i += 1,
            Some(' ') => {
                parsed.sign = Sign::Space;
                i += 1;
            }
            _ => {}
        }

        if chars.get(i) == Some(&'#') {
            parsed.alternate = true;
            i += 1;
        }

        if chars.get(i) == Some(&'0') {
            if parsed.align.is_none() {
                parsed.fill = '0';
                parsed.align = Some(Align::AfterSign);
            }
            i += 1;
        }

        let width_start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i > width_start {
            let digits: String = chars[width_start..i].iter().collect();
            parsed.width = digits
                .parse::<usize>()
                .ok()
                .filter(|&width| width <= MAX_WIDTH)
                .ok_or_else(unsupported)?;
        }

        match &chars[i..] {
            [] => {}
            [kind @ ('d' | 'x' | 'X' | 'b' | 'o' | 'c')] => parsed.kind = *kind,
            _ => return Err(unsupported()),
        }
        if parsed.kind == 'c' && (parsed.alternate || parsed.sign != Sign::Minus) {
            return Err(unsupported());
        }
        Ok(parsed)
    }

    fn render(&self, value: i128, out: &mut String) -> Result<(), TemplateError> {
        let magnitude = value.unsigned_abs();
        let (prefix, digits) = match self.kind {
            'x' => ("0x", format!("{magnitude:x}")),
            'X' => ("0X", format!("{magnitude:X}")),
            'b' => ("0b", format!("{magnitude:b}")),
            'o' => ("0o", format!("{magnitude:o}")),
            'c' => {
                let c = u32::try_from(value)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(TemplateError::InvalidChar(value))?;
                ("", c.to_string())
            }
            _ => ("", magnitude.to_string()),
        };

        let mut head = String::new();
        if value < 0 {
            head.push('-');
        } else if self.sign == Sign::Plus {
            head.push('+');
        } else if self.sign == Sign::Space {
            head.push(' ');
        }
        if self.alternate {
            head.push_str(prefix);
        }

        let len = head.chars().count() + digits.chars().count();
        let padding = self.width.saturating_sub(len);
        let fill = |n: usize, out: &mut String| out.extend(std::iter::repeat(self.fill).take(n));

        let align = match self.align {
            Some(align) => align,
            None if self.kind == 'c' => Align::Left,
            None => Align::Right,
        };
        match align {
            Align::Left => {
                out.push_str(&head);
                out.push_str(&digits);
                fill(padding, out);
            }
            Align::Right => {
                fill(padding, out);
                out.push_str(&head);
                out.push_str(&digits);
            }
            Align::Center => {
                fill(padding / 2, out);
                out.push_str(&head);
                out.push_str(&digits);
                fill(padding - padding / 2, out);
            }
            Align::AfterSign => {
                out.push_str(&head);
                fill(padding, out);
                out.push_str(&digits);
            }
        }
        Ok(())
    }
}

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

/// Applies `mode` to the `[:N]` / `[]` colour marks of a rendered message.
///
/// A mark is `[` followed by `]` (reset to the default foreground) or by `:`
/// and any of `f`, `b` and a colour digit `0`-`9`, closed by `]`. Anything
/// else starting with `[` is plain text.
pub fn apply_color_marks(text: &str, mode: ColorMode) -> String {
    if mode == ColorMode::Keep {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];
        match parse_color_mark(candidate) {
            Some((sgr, len)) => {
                if mode == ColorMode::Ansi {
                    let _ = write!(out, "{ESC}[{sgr}m");
                }
                rest = &candidate[len..];
            }
            None => {
                out.push('[');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// Returns the SGR parameter and the byte length of the mark.
fn parse_color_mark(text: &str) -> Option<(String, usize)> {
    if text.starts_with("[]") {
        return Some(("39".to_string(), 2));
    }
    let body = text.strip_prefix("[:")?;
    let close = body.find(']')?;

    let mut layer = '3';
    let mut color = '9';
    for c in body[..close].chars() {
        match c {
            'f' => layer = '3',
            'b' => layer = '4',
            '0'..='9' => color = c,
            _ => {
                layer = '3';
                color = '9';
            }
        }
    }
    Some((format!("{layer}{color}"), close + 3))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(template: &str, args: &[i128]) -> String {
        substitute(template, args).unwrap()
    }

    #[test]
    fn test_positional_substitution() {
        assert_eq!(render("value={}", &[42]), "value=42");
        assert_eq!(render("{} and {}", &[1, 2]), "1 and 2");
        assert_eq!(render("{1} before {0}", &[1, 2]), "2 before 1");
        assert_eq!(render("{0} twice {0}", &[7]), "7 twice 7");
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(render("{{{}}}", &[5]), "{5}");
        assert_eq!(render("set {{}} = {}", &[3]), "set {} = 3");
    }

    #[test]
    fn test_integer_presentations() {
        assert_eq!(render("{:#x}", &[0x3456]), "0x3456");
        assert_eq!(render("{:x}", &[255]), "ff");
        assert_eq!(render("{:#X}", &[255]), "0XFF");
        assert_eq!(render("{:#b}", &[0x7890]), "0b111100010010000");
        assert_eq!(render("{:o}", &[8]), "10");
        assert_eq!(render("{:c}", &[0x41]), "A");
        assert_eq!(render("{:d}", &[-10]), "-10");
    }

    #[test]
    fn test_width_fill_and_alignment() {
        assert_eq!(render("[{:5}]", &[42]), "[   42]");
        assert_eq!(render("[{:<5}]", &[42]), "[42   ]");
        assert_eq!(render("[{:^6}]", &[42]), "[  42  ]");
        assert_eq!(render("[{:*>5}]", &[42]), "[***42]");
        assert_eq!(render("[{:05}]", &[-42]), "[-0042]");
        assert_eq!(render("[{:#010x}]", &[255]), "[0x000000ff]");
        assert_eq!(render("[{:+}]", &[3]), "[+3]");
        assert_eq!(render("[{: }]", &[3]), "[ 3]");
    }

    #[test]
    fn test_oversized_width_is_rejected() {
        assert_eq!(render("[{:65535}]", &[1]).len(), 65537);
        assert_eq!(
            substitute("v={:65536}", &[1]),
            Err(TemplateError::UnsupportedSpec("65536".to_string()))
        );
        assert_eq!(
            substitute("v={:9999999999999999999}", &[1]),
            Err(TemplateError::UnsupportedSpec("9999999999999999999".to_string()))
        );
    }

    #[test]
    fn test_argument_count_mismatch() {
        assert_eq!(
            substitute("{} {}", &[1]),
            Err(TemplateError::MissingArgument { index: 1, supplied: 1 })
        );
        assert_eq!(
            substitute("only {}", &[1, 2]),
            Err(TemplateError::UnusedArguments { consumed: 1, supplied: 2 })
        );
        assert_eq!(
            substitute("no slots", &[1]),
            Err(TemplateError::UnusedArguments { consumed: 0, supplied: 1 })
        );
    }

    #[test]
    fn test_malformed_templates() {
        assert_eq!(substitute("open {", &[1]), Err(TemplateError::UnclosedBrace(5)));
        assert_eq!(substitute("close } {}", &[1]), Err(TemplateError::SingleClosingBrace(6)));
        assert_eq!(substitute("{} {0}", &[1]), Err(TemplateError::MixedNumbering));
        assert_eq!(
            substitute("{:.2f}", &[1]),
            Err(TemplateError::UnsupportedSpec(".2f".to_string()))
        );
        assert_eq!(
            substitute("{name}", &[1]),
            Err(TemplateError::InvalidField("name".to_string()))
        );
    }

    #[test]
    fn test_color_marks() {
        let text = "[:4]Czerwona[] Kaczka";
        assert_eq!(apply_color_marks(text, ColorMode::Keep), text);
        assert_eq!(apply_color_marks(text, ColorMode::Strip), "Czerwona Kaczka");
        assert_eq!(
            apply_color_marks(text, ColorMode::Ansi),
            "\x1b[34mCzerwona\x1b[39m Kaczka"
        );
        assert_eq!(apply_color_marks("[:b2]x", ColorMode::Ansi), "\x1b[42mx");
    }

    #[test]
    fn test_brackets_that_are_not_marks() {
        assert_eq!(apply_color_marks("[x] [:3", ColorMode::Strip), "[x] [:3");
        assert_eq!(apply_color_marks("a[", ColorMode::Ansi), "a[");
    }
}
