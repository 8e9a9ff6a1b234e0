//! Plain-text column layout for table output.

/// Left-aligned columns separated by two spaces. Widths count characters,
/// so wide (Hangul) glyphs may misalign slightly in a terminal.
pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let mut line = |cells: Vec<&str>| {
        let mut text = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                text.push_str("  ");
            }
            text.push_str(cell);
            let pad = widths[i].saturating_sub(cell.chars().count());
            text.extend(std::iter::repeat_n(' ', pad));
        }
        out.push_str(text.trim_end());
        out.push('\n');
    };

    line(headers.to_vec());
    for row in rows {
        line(row.iter().map(String::as_str).take(headers.len()).collect());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_aligned() {
        let out = render(
            &["LABEL", "VALUE"],
            &[
                vec!["Acme".into(), "8".into()],
                vec!["Globex Industries".into(), "0".into()],
            ],
        );
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "LABEL              VALUE");
        assert_eq!(lines[1], "Acme               8");
        assert_eq!(lines[2], "Globex Industries  0");
    }

    #[test]
    fn header_only() {
        assert_eq!(render(&["ID", "STATUS"], &[]), "ID  STATUS\n");
    }
}
