use crate::error::GroupError;
use crate::grouping::GroupSet;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

/// Download name of the spreadsheet export
pub const XLSX_FILE_NAME: &str = "auto-groups.xlsx";

/// Download name of the CSV export
pub const CSV_FILE_NAME: &str = "auto-groups.csv";

/// Name of the single worksheet in the spreadsheet export
pub const SHEET_NAME: &str = "Groups";

/// Groups laid out as columns
///
/// Column `i` is headed "Group i+1" and lists that group's members top to
/// bottom. Shorter groups are padded with empty strings up to the longest
/// group, so every row has one cell per group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Build the column table for `groups`
///
/// # Examples
/// ```
/// use autogroup::downloader::group_table;
/// use autogroup::grouping::group_text;
///
/// let groups = group_text("A\nB\nC", "2").unwrap();
/// let table = group_table(&groups).unwrap();
/// assert_eq!(table.headers, vec!["Group 1", "Group 2"]);
/// assert_eq!(table.rows, vec![vec!["A", "C"], vec!["B", ""]]);
/// ```
pub fn group_table(groups: &GroupSet) -> Result<GroupTable, GroupError> {
    if groups.is_empty() {
        return Err(GroupError::NoGroupsToExport);
    }

    let headers = (1..=groups.len()).map(|i| format!("Group {}", i)).collect();

    let rows = (0..groups.longest())
        .map(|row| {
            groups
                .groups()
                .iter()
                .map(|group| {
                    group
                        .get(row)
                        .map(|item| item.as_str().to_string())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    Ok(GroupTable { headers, rows })
}

/// Convert groups to CSV format
///
/// The first line holds the group headers, then one line per table row.
/// Values containing commas, quotes or newlines are quoted with inner quotes
/// doubled.
pub fn to_csv(groups: &GroupSet) -> Result<String, GroupError> {
    let table = group_table(groups)?;
    let mut csv_content = String::new();

    push_csv_row(&mut csv_content, &table.headers);
    for row in &table.rows {
        push_csv_row(&mut csv_content, row);
    }

    Ok(csv_content)
}

fn push_csv_row(csv_content: &mut String, values: &[String]) {
    for (c, value) in values.iter().enumerate() {
        if c > 0 {
            csv_content.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            let escaped = value.replace('"', "\"\"");
            csv_content.push_str(&format!("\"{}\"", escaped));
        } else {
            csv_content.push_str(value);
        }
    }
    csv_content.push('\n');
}

/// Convert groups to XLSX format
///
/// Writes the column table to a single worksheet named "Groups" with a bold
/// header row, using the rust_xlsxwriter library. Padding cells are left
/// blank rather than written as empty strings.
///
/// # Returns
/// * `Result<Vec<u8>, GroupError>` - XLSX file content as bytes or an error
pub fn to_xlsx(groups: &GroupSet) -> Result<Vec<u8>, GroupError> {
    let table = group_table(groups)?;
    write_workbook(&table).map_err(|e| GroupError::ExportFailed(e.to_string()))
}

fn write_workbook(table: &GroupTable) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (c, header) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, header.as_str(), &bold)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string((r + 1) as u32, c as u16, value.as_str())?;
            }
        }
    }

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;
    log::debug!(
        "wrote {} groups to a {} byte workbook",
        table.headers.len(),
        buffer.len()
    );

    Ok(buffer)
}
