use std::borrow::Cow;
use std::fmt::Write as _;

/// Renders an aligned plain-text table. Cells that parse as numbers (or the
/// `n/a` placeholder) are right-aligned; everything else is left-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, false));
    let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, false));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, true));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed == "n/a" || (!trimmed.is_empty() && trimmed.parse::<f64>().is_ok())
}

fn format_row(values: &[String], widths: &[usize], align_numbers: bool) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, &width)| {
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            if align_numbers && is_numeric(&sanitized) {
                format!("{padding}{sanitized}")
            } else {
                format!("{sanitized}{padding}")
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_right_aligned() {
        let headers = vec!["Issue".to_string(), "Accuracy".to_string()];
        let rows = vec![
            vec!["price".to_string(), "80.00".to_string()],
            vec!["uom".to_string(), "n/a".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Issue  Accuracy");
        assert_eq!(lines[1], "-----  --------");
        assert_eq!(lines[2], "price     80.00");
        assert_eq!(lines[3], "uom         n/a");
    }

    #[test]
    fn control_characters_are_flattened() {
        let headers = vec!["Note".to_string()];
        let rows = vec![vec!["a\tb\nc".to_string()]];
        assert!(render_table(&headers, &rows).contains("a b c"));
    }
}
