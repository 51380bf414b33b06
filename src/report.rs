//! Human readable status report of a camera.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::catalog::CapabilityCatalog;
use crate::controllable::Controllable;

const HEADERS: [&str; 7] = [
    "controllable",
    "value",
    "min value",
    "max value",
    "auto-mode",
    "in auto-mode",
    "writable",
];

/// Render the capabilities and a table of controllables.
///
/// Pure formatting; the caller supplies freshly read values.
#[must_use]
pub fn render(
    sdk_version: &str,
    catalog: &CapabilityCatalog,
    controls: &BTreeMap<String, Controllable>,
) -> String {
    let rows: Vec<[String; 7]> = controls
        .iter()
        .map(|(name, control)| {
            [
                name.clone(),
                control.value.to_string(),
                control.min_value.to_string(),
                control.max_value.to_string(),
                flag(control.supports_auto),
                flag(control.is_auto),
                flag(control.is_writable),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "\n(asi sdk: {sdk_version})");
    out.push_str(&catalog.describe());
    out.push('\n');
    write_row(&mut out, HEADERS.as_slice(), &widths);
    out.push_str("--\n");
    for row in &rows {
        write_row(&mut out, row.as_slice(), &widths);
    }
    out
}

fn flag(value: bool) -> String {
    let mark = if value { "*" } else { " " };
    mark.to_owned()
}

fn write_row<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    for (cell, width) in cells.iter().zip(widths) {
        let _ = write!(out, "| {:<width$} ", cell.as_ref());
    }
    out.push_str("|\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::asi294mc_info;

    fn controls() -> BTreeMap<String, Controllable> {
        let gain = Controllable {
            name: "Gain".to_owned(),
            min_value: 0,
            max_value: 570,
            default_value: 200,
            value: 120,
            is_writable: true,
            supports_auto: true,
            is_auto: false,
        };
        let temperature = Controllable {
            name: "Temperature".to_owned(),
            min_value: -500,
            max_value: 1000,
            default_value: 20,
            value: 215,
            is_writable: false,
            supports_auto: false,
            is_auto: false,
        };
        BTreeMap::from([
            ("Gain".to_owned(), gain),
            ("Temperature".to_owned(), temperature),
        ])
    }

    #[test]
    fn test_report_contains_catalog_and_rows() {
        let catalog = CapabilityCatalog::from(asi294mc_info());
        let report = render("1, 31", &catalog, &controls());
        assert!(report.contains("(asi sdk: 1, 31)"));
        assert!(report.contains("ZWO ASI294MC Pro (id: 0)"));
        assert!(report.contains("| Gain "));
        assert!(report.contains("| -500 "));
    }

    #[test]
    fn test_report_columns_are_aligned() {
        let catalog = CapabilityCatalog::from(asi294mc_info());
        let report = render("1, 31", &catalog, &controls());
        let table: Vec<&str> = report
            .lines()
            .skip_while(|line| !line.starts_with("| controllable"))
            .filter(|line| line.starts_with('|'))
            .collect();
        assert_eq!(table.len(), 3);
        let lengths: Vec<usize> = table.iter().map(|line| line.len()).collect();
        assert!(lengths.windows(2).all(|pair| matches!(pair, [a, b] if a == b)));
    }

    #[test]
    fn test_empty_registry_renders_header_only() {
        let catalog = CapabilityCatalog::from(asi294mc_info());
        let report = render("1, 31", &catalog, &BTreeMap::new());
        assert!(report.ends_with("--\n"));
    }
}
