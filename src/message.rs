use std::collections::BTreeMap;

use crate::error::TemplateError;

/// Named fields describing the triggering event, e.g. `name`, `path`,
/// `time`. Duration fields are pre-formatted to human-readable text by the
/// event source; rendering performs no formatting of its own.
pub type NotificationPayload = BTreeMap<String, String>;

/// Render a message template against an event payload.
///
/// `{field}` placeholders are replaced with the matching payload value;
/// `{{` and `}}` produce literal braces. Rendering is all-or-nothing: a
/// placeholder without a payload entry fails the whole render, so a partial
/// message is never produced.
///
/// # Errors
///
/// Returns `TemplateError::MissingField` when a placeholder has no payload
/// entry and `TemplateError::UnterminatedPlaceholder` when a `{` is never
/// closed.
pub fn render(template: &str, payload: &NotificationPayload) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => {
                            return Err(TemplateError::UnterminatedPlaceholder { field });
                        }
                    }
                }
                match payload.get(&field) {
                    Some(value) => out.push_str(value),
                    None => return Err(TemplateError::MissingField { field }),
                }
            }
            '}' => {
                // tolerate a lone '}' and collapse '}}' to one brace
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(entries: &[(&str, &str)]) -> NotificationPayload {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_job_complete_message() {
        let payload = payload(&[
            ("name", "part.gco"),
            ("time", "1:02:03"),
            ("printer_name", "Shop Printer"),
        ]);
        let message = render(
            "{printer_name} job complete: {name} done printing after {time}",
            &payload,
        )
        .expect("render");
        assert_eq!(
            message,
            "Shop Printer job complete: part.gco done printing after 1:02:03"
        );
    }

    #[test]
    fn render_is_deterministic() {
        let payload = payload(&[("name", "benchy.gco"), ("time", "4h 0m 12s")]);
        let template = "{name} after {time}";
        let first = render(template, &payload).expect("render");
        let second = render(template, &payload).expect("render");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_field_fails_without_partial_output() {
        let payload = payload(&[("name", "part.gco")]);
        let err = render("{name} finished after {time}", &payload).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingField {
                field: "time".to_string()
            }
        );
    }

    #[test]
    fn doubled_braces_are_literals() {
        let payload = payload(&[("name", "x")]);
        let message = render("{{literal}} {name}", &payload).expect("render");
        assert_eq!(message, "{literal} x");
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        let payload = payload(&[]);
        let err = render("stuck {name", &payload).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnterminatedPlaceholder {
                field: "name".to_string()
            }
        );
    }

    #[test]
    fn template_without_placeholders_passes_through() {
        let payload = payload(&[]);
        let message = render("printer is up", &payload).expect("render");
        assert_eq!(message, "printer is up");
    }
}
